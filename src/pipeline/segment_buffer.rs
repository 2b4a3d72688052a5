//! Speech segment buffer.
//!
//! Accumulates audio frames while speech is active and emits a completed
//! [`SpeechSegment`] when one of three conditions fires:
//! - the VAD reports debounced speech end,
//! - buffered duration reaches a hard cap (forced flush, bounds memory),
//! - recording is stopped explicitly.
//!
//! Candidates shorter than the configured minimum are discarded silently —
//! too short to be transcribable, not an error. A candidate whose VAD speech
//! timer under-reports the minimum first waits a short confirmation grace
//! window: speech resuming within the window continues the same segment,
//! otherwise the candidate is evaluated against its sample-derived duration.
//!
//! The speaking signal normally comes from the local VAD, but any source able
//! to produce a [`VadAnalysis`] (e.g. a server-side VAD) can drive the buffer.

use crate::audio::vad::{Clock, SystemClock, VadAnalysis, VadEvent};
use crate::defaults;
use crate::pipeline::types::{
    AudioFrame, FlushReason, SegmentResults, SegmentState, SpeechSegment,
};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Configuration for the segment buffer.
#[derive(Debug, Clone)]
pub struct SegmentBufferConfig {
    /// Minimum segment duration; shorter candidates are discarded.
    pub min_duration_ms: u32,
    /// Hard cap on buffered duration; reaching it force-flushes mid-utterance.
    pub max_duration_ms: u32,
    /// Grace window before a short candidate is finalized.
    pub confirmation_grace_ms: u32,
    /// Sample rate for duration calculations.
    pub sample_rate: u32,
    /// Source-language hint stamped onto emitted segments.
    pub language_hint: Option<String>,
}

impl Default for SegmentBufferConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: defaults::MIN_SEGMENT_MS,
            max_duration_ms: defaults::MAX_SEGMENT_MS,
            confirmation_grace_ms: defaults::CONFIRMATION_GRACE_MS,
            sample_rate: defaults::SAMPLE_RATE,
            language_hint: None,
        }
    }
}

/// Output of a buffer step.
#[derive(Debug, Clone)]
pub enum SegmentOutput {
    /// A segment completed and is ready for dispatch.
    Ready(SpeechSegment, FlushReason),
    /// A candidate was below the minimum duration and dropped.
    Discarded { id: u64, duration_ms: u32 },
}

impl SegmentOutput {
    /// Extracts the segment if this is a Ready variant.
    pub fn into_ready(self) -> Option<SpeechSegment> {
        match self {
            SegmentOutput::Ready(segment, _) => Some(segment),
            SegmentOutput::Discarded { .. } => None,
        }
    }
}

/// A short candidate waiting out its confirmation grace window.
#[derive(Debug)]
struct PendingConfirmation {
    id: u64,
    samples: Vec<i16>,
    started_at: Instant,
    deadline: Instant,
}

/// Accumulates frames into speech segments.
///
/// One instance per capture session. `push` is O(1) amortized (append only);
/// segment extraction copies once per segment, not per frame.
pub struct SpeechSegmentBuffer<C: Clock = SystemClock> {
    config: SegmentBufferConfig,
    buffer: Vec<i16>,
    /// Buffer length at the last above-threshold frame. The segment is
    /// truncated here on finalize so trailing debounce silence does not
    /// count toward its duration.
    speech_len: usize,
    started_at: Option<Instant>,
    next_id: u64,
    pending: Option<PendingConfirmation>,
    clock: C,
}

impl SpeechSegmentBuffer<SystemClock> {
    /// Creates a new buffer with the system clock.
    pub fn new(config: SegmentBufferConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> SpeechSegmentBuffer<C> {
    /// Creates a new buffer with the given configuration and clock.
    pub fn with_clock(config: SegmentBufferConfig, clock: C) -> Self {
        Self {
            config,
            buffer: Vec::new(),
            speech_len: 0,
            started_at: None,
            next_id: 0,
            pending: None,
            clock,
        }
    }

    /// Duration of the currently buffered audio in milliseconds.
    pub fn buffered_duration_ms(&self) -> u32 {
        samples_to_ms(self.buffer.len(), self.config.sample_rate)
    }

    /// Whether a short candidate is waiting out its grace window.
    pub fn has_pending_confirmation(&self) -> bool {
        self.pending.is_some()
    }

    /// Processes one frame together with its VAD analysis.
    ///
    /// Returns zero or more outputs: a grace-window expiry and a forced
    /// flush can both fire on the same frame.
    pub fn push(&mut self, frame: &AudioFrame, analysis: &VadAnalysis) -> Vec<SegmentOutput> {
        let mut outputs = Vec::new();
        let now = self.clock.now();

        if self.pending.is_some() {
            if analysis.event == VadEvent::SpeechStart {
                // Speech resumed within the grace window: the candidate was
                // real speech after all. Continue the same segment.
                if let Some(pending) = self.pending.take() {
                    debug_assert!(self.buffer.is_empty());
                    self.buffer = pending.samples;
                    self.speech_len = self.buffer.len();
                    self.started_at = Some(pending.started_at);
                    self.next_id = pending.id;
                }
            } else if let Some(output) = self.expire_pending(now) {
                outputs.push(output);
            }
        }

        if analysis.is_speaking {
            if self.started_at.is_none() {
                self.started_at = Some(frame.timestamp);
            }
            self.buffer.extend_from_slice(&frame.samples);
            if is_speech_frame(analysis) {
                self.speech_len = self.buffer.len();
            }

            if self.buffered_duration_ms() >= self.config.max_duration_ms
                && let Some(segment) = self.extract(now, self.buffer.len())
            {
                // Forced flush at the cap; buffering continues afterwards.
                outputs.push(SegmentOutput::Ready(segment, FlushReason::MaxDuration));
            }
        } else if analysis.event == VadEvent::SpeechEnd && !self.buffer.is_empty() {
            outputs.extend(self.finalize(now, analysis.speech_ms));
        }

        outputs
    }

    /// Checks whether the pending confirmation deadline has passed.
    ///
    /// Drivers call this from a timer so a short candidate is resolved even
    /// when no further frames arrive.
    pub fn poll_confirmation(&mut self) -> Option<SegmentOutput> {
        let now = self.clock.now();
        self.expire_pending(now)
    }

    /// Time remaining until the pending confirmation deadline, if any.
    pub fn confirmation_deadline_in(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.pending
            .as_ref()
            .map(|p| p.deadline.saturating_duration_since(now))
    }

    /// Flushes any in-progress buffer, e.g. when recording stops.
    ///
    /// A pending short candidate is resolved immediately against its real
    /// duration; an in-progress buffer is emitted if long enough.
    pub fn flush(&mut self) -> Vec<SegmentOutput> {
        let now = self.clock.now();
        let mut outputs = Vec::new();

        if let Some(pending) = self.pending.take() {
            outputs.push(self.evaluate_candidate(
                pending.id,
                pending.samples,
                pending.started_at,
                now,
                FlushReason::Stopped,
            ));
        }

        if !self.buffer.is_empty() {
            let id = self.next_id;
            let started_at = self.started_at.unwrap_or(now);
            let samples = std::mem::take(&mut self.buffer);
            self.speech_len = 0;
            self.started_at = None;
            outputs.push(self.evaluate_candidate(id, samples, started_at, now, FlushReason::Stopped));
        }

        outputs
    }

    /// Clears all state without emitting anything.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.speech_len = 0;
        self.started_at = None;
        self.pending = None;
        self.next_id = 0;
    }

    /// Handles debounced speech end: dispatch, or park short candidates in
    /// the grace window.
    fn finalize(&mut self, now: Instant, vad_speech_ms: u32) -> Vec<SegmentOutput> {
        if vad_speech_ms >= self.config.min_duration_ms {
            return match self.extract(now, self.speech_len) {
                Some(segment) => vec![SegmentOutput::Ready(segment, FlushReason::SpeechEnd)],
                None => Vec::new(),
            };
        }

        // The VAD timer under-reports the minimum. Wait out the grace window
        // before deciding — the speaker may just be pausing. A single pending
        // confirmation at a time: the previous one was resolved before any
        // new segment could begin.
        let id = self.next_id;
        let mut samples = std::mem::take(&mut self.buffer);
        samples.truncate(self.speech_len.max(1).min(samples.len()));
        let started_at = self.started_at.take().unwrap_or(now);
        self.speech_len = 0;
        self.pending = Some(PendingConfirmation {
            id,
            samples,
            started_at,
            deadline: now + Duration::from_millis(u64::from(self.config.confirmation_grace_ms)),
        });
        Vec::new()
    }

    fn expire_pending(&mut self, now: Instant) -> Option<SegmentOutput> {
        let expired = self.pending.as_ref().is_some_and(|p| now >= p.deadline);
        if !expired {
            return None;
        }
        self.pending.take().map(|pending| {
            self.evaluate_candidate(
                pending.id,
                pending.samples,
                pending.started_at,
                now,
                FlushReason::SpeechEnd,
            )
        })
    }

    /// Evaluates a finished candidate against the real, sample-derived
    /// duration and either dispatches or discards it.
    fn evaluate_candidate(
        &mut self,
        id: u64,
        samples: Vec<i16>,
        started_at: Instant,
        now: Instant,
        reason: FlushReason,
    ) -> SegmentOutput {
        let duration_ms = samples_to_ms(samples.len(), self.config.sample_rate);
        if duration_ms < self.config.min_duration_ms {
            return SegmentOutput::Discarded { id, duration_ms };
        }
        self.next_id = id + 1;
        SegmentOutput::Ready(
            SpeechSegment {
                id,
                samples,
                started_at,
                ended_at: now,
                duration_ms,
                language_hint: self.config.language_hint.clone(),
                state: SegmentState::Ready,
                results: SegmentResults::default(),
            },
            reason,
        )
    }

    /// Extracts the buffered audio into a segment, truncated to `len`.
    fn extract(&mut self, now: Instant, len: usize) -> Option<SpeechSegment> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut samples = std::mem::take(&mut self.buffer);
        samples.truncate(len.max(1));
        let started_at = self.started_at.take().unwrap_or(now);
        self.speech_len = 0;

        let duration_ms = samples_to_ms(samples.len(), self.config.sample_rate);
        if duration_ms < self.config.min_duration_ms {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        Some(SpeechSegment {
            id,
            samples,
            started_at,
            ended_at: now,
            duration_ms,
            language_hint: self.config.language_hint.clone(),
            state: SegmentState::Ready,
            results: SegmentResults::default(),
        })
    }

    /// Runs the buffer as a station: frames+analyses in, segments out.
    ///
    /// Discards are logged at the station level, not emitted — a too-short
    /// segment is a normal operating condition.
    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<(AudioFrame, VadAnalysis)>,
        output: mpsc::Sender<(SpeechSegment, FlushReason)>,
    ) {
        loop {
            // A pending grace window must expire on time even if the capture
            // side goes quiet.
            let recv = async {
                match self.confirmation_deadline_in() {
                    Some(wait) => match tokio::time::timeout(wait, input.recv()).await {
                        Ok(item) => (item, false),
                        Err(_) => (None, true),
                    },
                    None => (input.recv().await, false),
                }
            };

            let (item, timed_out) = recv.await;

            if timed_out {
                if let Some(SegmentOutput::Ready(segment, reason)) = self.poll_confirmation()
                    && output.send((segment, reason)).await.is_err()
                {
                    return;
                }
                continue;
            }

            let Some((frame, analysis)) = item else {
                // Input closed: flush what we have and stop.
                for out in self.flush() {
                    if let SegmentOutput::Ready(segment, reason) = out
                        && output.send((segment, reason)).await.is_err()
                    {
                        return;
                    }
                }
                return;
            };

            for out in self.push(&frame, &analysis) {
                if let SegmentOutput::Ready(segment, reason) = out
                    && output.send((segment, reason)).await.is_err()
                {
                    return;
                }
            }
        }
    }
}

/// Whether the analyzed frame itself was above threshold.
fn is_speech_frame(analysis: &VadAnalysis) -> bool {
    matches!(analysis.event, VadEvent::SpeechStart | VadEvent::Speech)
}

fn samples_to_ms(len: usize, sample_rate: u32) -> u32 {
    ((len as u64 * 1000) / u64::from(sample_rate)) as u32
}
