//! Station failure reporting.
//!
//! Pipeline stations (capture, segment buffer, processing queue, playback)
//! report failures through an [`ErrorReporter`] instead of logging inline,
//! so an embedding application can surface them in its own UI. Most station
//! errors are recoverable — a skipped chunk, a dropped segment; a fatal one
//! means the reporting station is shutting down and the pipeline with it.

use std::fmt;

/// A failure inside one pipeline station.
#[derive(Debug, Clone)]
pub enum StationError {
    /// The station dropped some work but keeps running.
    Recoverable(String),
    /// The station cannot continue, e.g. the capture device is gone.
    Fatal(String),
}

impl StationError {
    /// Whether the reporting station is about to shut down.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StationError::Fatal(_))
    }
}

impl fmt::Display for StationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StationError::Recoverable(msg) => write!(f, "recoverable: {}", msg),
            StationError::Fatal(msg) => write!(f, "fatal: {}", msg),
        }
    }
}

impl std::error::Error for StationError {}

/// Receives station errors as they happen.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, station: &str, error: &StationError);
}

/// Default reporter: stderr, one line per error.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, station: &str, error: &StationError) {
        eprintln!("voxlate: [{}] {}", station, error);
    }
}
