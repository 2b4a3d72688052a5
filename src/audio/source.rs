use crate::defaults;
use crate::error::{Result, VoxlateError};

/// Where captured audio comes from.
///
/// Microphone input travels a separate acoustic path from the speakers, so
/// playback cannot leak into it directly. System/tab-audio capture shares the
/// output path and must be gated while translated audio is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Microphone,
    SystemAudio,
}

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
pub trait AudioSource: Send + Sync {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Read accumulated audio samples from the source.
    ///
    /// # Returns
    /// Vector of 16-bit PCM audio samples, or an error
    fn read_samples(&mut self) -> Result<Vec<i16>>;

    /// The kind of source this is, for feedback gating.
    fn kind(&self) -> SourceKind {
        SourceKind::Microphone
    }

    /// Whether this source runs out of audio (file, scripted mock). Live
    /// devices return false: an empty read just means nothing arrived yet.
    fn is_finite(&self) -> bool {
        false
    }
}

/// One phase of scripted mock audio: the same samples for `count` reads.
#[derive(Debug, Clone)]
pub struct FramePhase {
    pub samples: Vec<i16>,
    pub count: u32,
}

/// Configuration for audio source initialization
#[derive(Debug, Clone)]
pub struct AudioSourceConfig {
    pub sample_rate: u32,
}

impl Default for AudioSourceConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

/// Mock audio source for testing
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    samples: Vec<i16>,
    phases: Vec<FramePhase>,
    phase_index: usize,
    phase_reads: u32,
    kind: SourceKind,
    live: bool,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Create a new mock audio source with default settings
    pub fn new() -> Self {
        Self {
            is_started: false,
            samples: vec![0i16; 160],
            phases: Vec::new(),
            phase_index: 0,
            phase_reads: 0,
            kind: SourceKind::Microphone,
            live: false,
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Configure the mock to return specific samples
    pub fn with_samples(mut self, samples: Vec<i16>) -> Self {
        self.samples = samples;
        self
    }

    /// Configure a scripted sequence of phases. Once all phases are
    /// exhausted, reads return empty and the source reports finite.
    pub fn with_frame_sequence(mut self, phases: Vec<FramePhase>) -> Self {
        self.phases = phases;
        self
    }

    /// Treat the mock as a live source: exhausted phases keep returning
    /// empty reads instead of signalling end-of-stream.
    pub fn as_live_source(mut self) -> Self {
        self.live = true;
        self
    }

    /// Configure the source kind
    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(VoxlateError::AudioCapture {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(VoxlateError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        if self.phases.is_empty() {
            return Ok(self.samples.clone());
        }
        while self.phase_index < self.phases.len() {
            let phase = &self.phases[self.phase_index];
            if self.phase_reads < phase.count {
                self.phase_reads += 1;
                return Ok(phase.samples.clone());
            }
            self.phase_index += 1;
            self.phase_reads = 0;
        }
        Ok(Vec::new())
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn is_finite(&self) -> bool {
        !self.phases.is_empty() && !self.live
    }
}
