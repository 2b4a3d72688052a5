//! Data types flowing through the translation pipeline.

use std::time::Instant;

/// A frame of raw audio samples with timing information.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// PCM samples (16-bit signed integers).
    pub samples: Vec<i16>,
    /// Timestamp when this frame was captured.
    pub timestamp: Instant,
    /// Sequence number for ordering and gap detection.
    pub sequence: u64,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(samples: Vec<i16>, timestamp: Instant, sequence: u64) -> Self {
        Self {
            samples,
            timestamp,
            sequence,
        }
    }

    /// Returns the duration of this frame in milliseconds.
    pub fn duration_ms(&self, sample_rate: u32) -> u32 {
        (self.samples.len() as u32 * 1000) / sample_rate
    }
}

/// Lifecycle state of a speech segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Frames are still being accumulated.
    Buffering,
    /// Segment is complete and awaiting dispatch.
    Ready,
    /// Segment was handed to the processing queue.
    Dispatched,
    /// Both processing paths settled successfully.
    Completed,
    /// At least one path failed terminally.
    Failed,
    /// Segment was below the minimum duration and dropped silently.
    Discarded,
}

/// Results of the two independent processing paths.
#[derive(Debug, Clone, Default)]
pub struct SegmentResults {
    /// Transcript / text-translation path output.
    pub transcript: Option<String>,
    /// Synthesized-audio path output (opaque encoded bytes).
    pub audio: Option<Vec<u8>>,
}

/// A bounded span of captured speech, dispatched as one unit of work.
///
/// Owned by the processing queue once dispatched; the segment buffer never
/// mutates a segment after handing it off.
#[derive(Debug, Clone)]
pub struct SpeechSegment {
    /// Monotonically increasing segment id within a capture session.
    pub id: u64,
    /// Concatenated PCM samples in capture order.
    pub samples: Vec<i16>,
    /// Timestamp of the first frame.
    pub started_at: Instant,
    /// Timestamp when the segment was finalized.
    pub ended_at: Instant,
    /// Duration derived from the sample count.
    pub duration_ms: u32,
    /// Optional source-language hint forwarded to the remote session.
    pub language_hint: Option<String>,
    /// Lifecycle state.
    pub state: SegmentState,
    /// Per-path results, filled in by the processing queue.
    pub results: SegmentResults,
}

/// Why a segment was finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// VAD reported debounced speech end.
    SpeechEnd,
    /// Buffered duration reached the hard cap.
    MaxDuration,
    /// Recording was stopped explicitly.
    Stopped,
}

/// A synthesized-audio payload tagged with arrival order.
#[derive(Debug, Clone)]
pub struct PlaybackChunk {
    /// Arrival sequence number; chunks play strictly in this order.
    pub sequence: u64,
    /// Opaque encoded audio payload.
    pub payload: Vec<u8>,
}

impl PlaybackChunk {
    pub fn new(sequence: u64, payload: Vec<u8>) -> Self {
        Self { sequence, payload }
    }
}

/// Events emitted by the pipeline for a presentation layer to consume.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// VAD calibration finished; the pipeline is live.
    Calibrated { noise_floor: f32, threshold: f32 },
    /// Speech started.
    SpeechStart,
    /// A segment was dispatched for processing.
    SegmentDispatched { id: u64, duration_ms: u32 },
    /// A segment was dropped because the processing queue was full.
    QueueFull { id: u64 },
    /// Incremental transcript text for a segment.
    TranscriptDelta { segment_id: u64, text: String },
    /// Both paths settled for a segment.
    SegmentComplete {
        id: u64,
        transcript: Option<String>,
        audio: bool,
    },
    /// Playback started draining the queue.
    PlaybackStarted,
    /// Playback queue fully drained.
    PlaybackDrained,
    /// A user-visible failure (transport loss, capacity).
    Failure { message: String },
}
