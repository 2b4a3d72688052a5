//! Audio capture and voice activity detection.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod source;
pub mod vad;

pub use source::{AudioSource, AudioSourceConfig, MockAudioSource, SourceKind};
pub use vad::{
    Clock, SystemClock, VadAnalysis, VadConfig, VadEvent, VadPhase, VoiceActivityDetector,
    calculate_rms,
};
