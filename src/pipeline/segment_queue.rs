//! Segment processing queue.
//!
//! Takes completed speech segments and runs each through two independent
//! paths: transcription (text) and translation audio (synthesized speech).
//! The paths are isolated per segment — one path failing still delivers the
//! other's result, and one segment failing never blocks the segments behind
//! it.
//!
//! Processing is initiated in submission order with a bounded number of
//! segments in flight (default 1, so results arrive in speaking order).

use crate::defaults;
use crate::error::VoxlateError;
use crate::pipeline::types::{SegmentState, SpeechSegment};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// One processing path for a segment.
///
/// Implementations wrap the session transport (or a local model). Both paths
/// receive the same segment audio; each returns its own result or error.
#[async_trait]
pub trait SegmentProcessor: Send + Sync {
    /// Produces a transcript of the segment in the source language.
    async fn transcribe(&self, segment: &SpeechSegment) -> Result<String, VoxlateError>;

    /// Produces translated speech audio for the segment.
    async fn synthesize(&self, segment: &SpeechSegment) -> Result<Vec<u8>, VoxlateError>;
}

/// Outcome of processing one segment.
#[derive(Debug, Clone)]
pub struct ProcessedSegment {
    pub segment: SpeechSegment,
    /// Per-path errors, kept so callers can report what was lost.
    pub transcript_error: Option<String>,
    pub audio_error: Option<String>,
}

impl ProcessedSegment {
    /// Whether at least one path produced a result.
    pub fn has_results(&self) -> bool {
        self.segment.results.transcript.is_some() || self.segment.results.audio.is_some()
    }
}

/// Configuration for the processing queue.
#[derive(Debug, Clone)]
pub struct SegmentQueueConfig {
    /// Maximum segments being processed at once.
    pub max_in_flight: usize,
}

impl Default for SegmentQueueConfig {
    fn default() -> Self {
        Self {
            max_in_flight: defaults::MAX_SEGMENTS_IN_FLIGHT,
        }
    }
}

/// Admission side of a running processing queue.
///
/// `enqueue` never waits: a segment that cannot be admitted right now is
/// rejected so the caller can report the drop instead of stalling the
/// capture path behind a backed-up queue.
#[derive(Clone)]
pub struct SegmentQueueHandle {
    input: mpsc::Sender<SpeechSegment>,
}

impl SegmentQueueHandle {
    pub fn new(input: mpsc::Sender<SpeechSegment>) -> Self {
        Self { input }
    }

    /// Admits a segment without blocking.
    ///
    /// Returns the segment id on admission, `None` when the segment is
    /// empty or the queue is full (the segment is dropped).
    pub fn enqueue(&self, segment: SpeechSegment) -> Option<u64> {
        if segment.samples.is_empty() {
            return None;
        }
        let id = segment.id;
        self.input.try_send(segment).ok().map(|_| id)
    }
}

/// Drives segments through both processing paths.
pub struct SegmentProcessingQueue<P: SegmentProcessor + 'static> {
    config: SegmentQueueConfig,
    processor: Arc<P>,
}

impl<P: SegmentProcessor + 'static> SegmentProcessingQueue<P> {
    pub fn new(config: SegmentQueueConfig, processor: Arc<P>) -> Self {
        Self { config, processor }
    }

    /// Runs both paths for one segment and merges the outcomes.
    ///
    /// Path failures are captured, not propagated: a transcript without
    /// audio (or vice versa) is still worth delivering.
    pub async fn process_one(processor: &P, mut segment: SpeechSegment) -> ProcessedSegment {
        segment.state = SegmentState::Dispatched;

        let (transcript, audio) = tokio::join!(
            processor.transcribe(&segment),
            processor.synthesize(&segment),
        );

        let mut transcript_error = None;
        let mut audio_error = None;

        match transcript {
            Ok(text) => segment.results.transcript = Some(text),
            Err(e) => transcript_error = Some(e.to_string()),
        }
        match audio {
            Ok(bytes) => segment.results.audio = Some(bytes),
            Err(e) => audio_error = Some(e.to_string()),
        }

        segment.state = if segment.results.transcript.is_some() || segment.results.audio.is_some()
        {
            SegmentState::Completed
        } else {
            SegmentState::Failed
        };

        ProcessedSegment {
            segment,
            transcript_error,
            audio_error,
        }
    }

    /// Runs the queue as a station: segments in, processed segments out.
    ///
    /// Segments are started strictly in arrival order, at most
    /// `max_in_flight` at a time. Returns when the input closes and all
    /// in-flight work has drained.
    pub async fn run(
        self,
        mut input: mpsc::Receiver<SpeechSegment>,
        output: mpsc::Sender<ProcessedSegment>,
    ) {
        let max_in_flight = self.config.max_in_flight.max(1);
        let mut in_flight: JoinSet<ProcessedSegment> = JoinSet::new();
        let mut input_open = true;

        loop {
            tokio::select! {
                // Only admit new segments while below the concurrency cap.
                segment = input.recv(), if input_open && in_flight.len() < max_in_flight => {
                    match segment {
                        Some(segment) => {
                            let processor = Arc::clone(&self.processor);
                            in_flight.spawn(async move {
                                Self::process_one(processor.as_ref(), segment).await
                            });
                        }
                        None => input_open = false,
                    }
                }
                result = in_flight.join_next(), if !in_flight.is_empty() => {
                    match result {
                        Some(Ok(processed)) => {
                            if output.send(processed).await.is_err() {
                                return;
                            }
                        }
                        // A panicked path task drops that segment; the
                        // queue itself keeps running.
                        Some(Err(e)) => {
                            eprintln!("[segment-queue] processing task failed: {}", e);
                        }
                        None => {}
                    }
                }
                else => {
                    if !input_open && in_flight.is_empty() {
                        return;
                    }
                }
            }
        }
    }
}
