//! Playback queue and feedback gate.
//!
//! Translated audio chunks play back gapless and in strict arrival order.
//! While anything is playing or queued, a shared [`FeedbackGate`] stays
//! raised so the capture side can drop system-audio frames — otherwise the
//! translation's own audio would be picked up and re-translated.
//!
//! The gate spans the whole queue, not individual chunks: back-to-back
//! chunks must not open a capture window in the gap between them.
//!
//! A stop clears the queue instead of draining it — audio belonging to a
//! stopped session must not play out later.

use crate::error::VoxlateError;
use crate::pipeline::types::PlaybackChunk;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};

/// Shared playing-state flag.
///
/// Raised when the first queued chunk starts and lowered only when the
/// queue is fully drained. Cheap to clone and to check per audio frame.
#[derive(Debug, Clone, Default)]
pub struct FeedbackGate {
    playing: Arc<AtomicBool>,
}

impl FeedbackGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether translated audio is currently playing or queued.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub(crate) fn raise(&self) {
        self.playing.store(true, Ordering::Release);
    }

    pub(crate) fn lower(&self) {
        self.playing.store(false, Ordering::Release);
    }
}

/// An audio sink that plays one chunk to completion.
///
/// `play` returns when the chunk has finished playing, not when it has been
/// submitted — the queue relies on this for gapless in-order output.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    async fn play(&self, payload: &[u8]) -> Result<(), VoxlateError>;
}

/// Policy for system audio while translations play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughMode {
    /// System audio is muted whenever the gate is raised.
    Muted,
    /// System audio keeps playing; capture-side gating alone prevents
    /// feedback.
    Passthrough,
}

/// Configuration for the playback queue.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub passthrough: PassthroughMode,
    /// Gain applied to monitored input when pass-through is enabled.
    pub output_gain: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            passthrough: PassthroughMode::Muted,
            output_gain: 1.0,
        }
    }
}

impl PlaybackConfig {
    /// Monitor gain under this policy, given the current playing state.
    ///
    /// Hard-muted while translated audio is playing or queued; the
    /// configured preference applies again once the queue drains.
    pub fn monitor_gain(&self, playing: bool) -> f32 {
        if playing {
            return 0.0;
        }
        match self.passthrough {
            PassthroughMode::Muted => 0.0,
            PassthroughMode::Passthrough => self.output_gain,
        }
    }
}

/// Plays queued chunks one at a time, in arrival order.
pub struct PlaybackQueue<O: AudioOutput> {
    output: Arc<O>,
    gate: FeedbackGate,
}

/// Events the queue reports to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// First chunk of a playback run started; the gate is raised.
    Started,
    /// A chunk finished playing.
    ChunkDone { sequence: u64 },
    /// A chunk could not be played and was skipped.
    ChunkSkipped { sequence: u64, message: String },
    /// The queue fully drained; the gate is lowered.
    Drained,
}

impl<O: AudioOutput> PlaybackQueue<O> {
    pub fn new(output: Arc<O>, gate: FeedbackGate) -> Self {
        Self { output, gate }
    }

    pub fn gate(&self) -> FeedbackGate {
        self.gate.clone()
    }

    /// Runs the queue as a station: chunks in, playback events out.
    ///
    /// Chunks play strictly in the order received. A chunk that fails to
    /// play is skipped with an event; the run continues with the next one.
    /// Returns when the input closes and the queue has drained.
    ///
    /// When `stop` flips to true (or its sender is gone), the current chunk
    /// is abandoned and everything still queued is discarded: stale audio
    /// must not resume after a stop.
    pub async fn run(
        self,
        mut input: mpsc::Receiver<PlaybackChunk>,
        events: mpsc::Sender<PlaybackEvent>,
        mut stop: watch::Receiver<bool>,
    ) {
        'playing: loop {
            let first = tokio::select! {
                chunk = input.recv() => match chunk {
                    Some(chunk) => chunk,
                    None => return,
                },
                _ = stop.wait_for(|stopped| *stopped) => break 'playing,
            };

            // A new playback run begins. The gate stays raised across every
            // chunk of the run, including the gaps between chunks.
            self.gate.raise();
            if events.send(PlaybackEvent::Started).await.is_err() {
                self.gate.lower();
                return;
            }

            let mut next = Some(first);
            while let Some(chunk) = next.take() {
                let result = tokio::select! {
                    result = self.output.play(&chunk.payload) => result,
                    _ = stop.wait_for(|stopped| *stopped) => {
                        self.gate.lower();
                        break 'playing;
                    }
                };
                let event = match result {
                    Ok(()) => PlaybackEvent::ChunkDone {
                        sequence: chunk.sequence,
                    },
                    Err(e) => PlaybackEvent::ChunkSkipped {
                        sequence: chunk.sequence,
                        message: e.to_string(),
                    },
                };
                if events.send(event).await.is_err() {
                    self.gate.lower();
                    return;
                }

                // Drain without blocking: only lower the gate once nothing
                // else is waiting.
                next = match input.try_recv() {
                    Ok(chunk) => Some(chunk),
                    Err(mpsc::error::TryRecvError::Empty)
                    | Err(mpsc::error::TryRecvError::Disconnected) => None,
                };
            }

            self.gate.lower();
            if events.send(PlaybackEvent::Drained).await.is_err() {
                return;
            }
        }

        // Stopped: swallow whatever the upstream stations still flush so
        // they can finish their own teardown, but play none of it.
        while input.recv().await.is_some() {}
    }
}
