//! Translation pipeline: segment buffering, dual-path processing, playback,
//! and the orchestrator that wires them to an audio source.

pub mod error;
pub mod orchestrator;
pub mod playback;
pub mod segment_buffer;
pub mod segment_queue;
pub mod types;

pub use error::{ErrorReporter, LogReporter, StationError};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
pub use playback::{AudioOutput, FeedbackGate, PassthroughMode, PlaybackConfig, PlaybackQueue};
pub use segment_buffer::{SegmentBufferConfig, SegmentOutput, SpeechSegmentBuffer};
pub use segment_queue::{
    ProcessedSegment, SegmentProcessingQueue, SegmentProcessor, SegmentQueueConfig,
    SegmentQueueHandle,
};
pub use types::{
    AudioFrame, FlushReason, PipelineEvent, PlaybackChunk, SegmentState, SpeechSegment,
};
