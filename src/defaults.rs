//! Default configuration constants for voxlate.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

use std::time::Duration;

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech processing and matches what the remote
/// translation session expects for appended audio.
pub const SAMPLE_RATE: u32 = 16000;

/// Number of frames collected for VAD calibration.
///
/// The first N frames of a capture session are treated as ambient noise and
/// used to derive the noise floor and adaptive threshold. At the default
/// 100ms frame size this is ~3 seconds of calibration.
pub const CALIBRATION_FRAMES: usize = 30;

/// Length of the rolling energy history used for smoothing.
///
/// Classification runs on the average of the last H frame energies rather
/// than the instantaneous value, suppressing single-frame spikes.
pub const ENERGY_HISTORY: usize = 10;

/// Minimum adaptive threshold.
///
/// A perfectly silent calibration window would otherwise produce a
/// near-zero threshold where any noise registers as speech.
pub const MIN_THRESHOLD: f32 = 0.01;

/// Multiplier on the calibration standard deviation when deriving the
/// adaptive threshold (`noise_floor + K * stddev`).
pub const THRESHOLD_STDDEV_FACTOR: f32 = 3.0;

/// Duration of continuous sub-threshold energy before speech is considered
/// ended, in milliseconds.
///
/// 800ms tolerates natural mid-sentence dips without fragmenting one
/// utterance into many segments.
pub const DEBOUNCE_MS: u32 = 800;

/// Minimum segment duration in milliseconds.
///
/// Candidates shorter than this are too short to transcribe and are
/// discarded silently.
pub const MIN_SEGMENT_MS: u32 = 300;

/// Maximum buffered segment duration in milliseconds.
///
/// A segment is force-flushed at this cap even mid-utterance to bound
/// memory; buffering continues for subsequent audio.
pub const MAX_SEGMENT_MS: u32 = 30_000;

/// Grace period before a short candidate segment is finalized, in milliseconds.
///
/// If speech resumes within this window the segment continues instead of
/// being discarded; otherwise it is evaluated against the real duration.
pub const CONFIRMATION_GRACE_MS: u32 = 500;

/// Capacity of the response queue's pending list.
///
/// A backpressure ceiling so that persistent remote conflicts cannot grow
/// the queue without bound.
pub const RESPONSE_QUEUE_CAPACITY: usize = 10;

/// Backoff before retrying after an active-response conflict.
pub const CONFLICT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Delay before re-attempting an enqueue that was rejected because a
/// response was already in progress.
pub const ENQUEUE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Maximum segments concurrently in flight through the processing queue.
///
/// 1 respects the remote session's single-response constraint; raise it only
/// when the two paths are backed by independent remote sessions.
pub const MAX_SEGMENTS_IN_FLIGHT: usize = 1;

/// Capacity of the segment processing queue.
pub const SEGMENT_QUEUE_CAPACITY: usize = 8;

/// Capacity of the playback queue, in chunks.
pub const PLAYBACK_QUEUE_CAPACITY: usize = 64;

/// Staleness timeout for a capture lock.
///
/// A lock whose owner has not renewed within this window may be taken over.
pub const LOCK_STALE_AFTER: Duration = Duration::from_secs(30);
