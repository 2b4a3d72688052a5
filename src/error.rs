//! Error types for voxlate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxlateError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Playback errors
    #[error("Audio playback failed: {message}")]
    Playback { message: String },

    // Queueing errors (backpressure)
    #[error("Previous response in progress")]
    ResponseInProgress,

    #[error("Queue is at capacity ({capacity})")]
    QueueFull { capacity: usize },

    #[error("Queue cleared")]
    QueueCleared,

    // Remote session errors
    #[error("Session error {code}: {message}")]
    Session { code: String, message: String },

    #[error("Transport failure: {message}")]
    Transport { message: String },

    // Capture lock errors
    #[error("Capture lock held by {owner}")]
    LockHeld { owner: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl VoxlateError {
    /// Returns true for errors the pipeline recovers from locally and that
    /// must never be surfaced to a user-visible layer.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VoxlateError::ResponseInProgress | VoxlateError::Playback { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxlateError>;
