//! voxlate - Real-time bidirectional speech translation client core
//!
//! Self-calibrating VAD, speech segmentation, single-flight response
//! arbitration, and gapless ordered playback over a realtime translation
//! session.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod lock;
pub mod pipeline;
pub mod session;

// Core traits (capture → process → play)
pub use audio::source::{AudioSource, SourceKind};
pub use pipeline::playback::AudioOutput;
pub use pipeline::segment_queue::SegmentProcessor;
pub use session::transport::SessionTransport;

// Pipeline
pub use pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineHandle};

// Session
pub use session::{Session, SessionProcessor, TranslationDirectives};

// Error handling
pub use error::{Result, VoxlateError};

// Config
pub use config::{Config, SensitivityTier};

// Capture lock
pub use lock::CaptureLock;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
