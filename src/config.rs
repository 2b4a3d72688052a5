use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub vad: VadSettings,
    pub segment: SegmentSettings,
    pub session: SessionSettings,
    pub playback: PlaybackSettings,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    /// Whether captured audio comes from a loopback/system-audio source.
    /// Such sources are subject to feedback gating during playback.
    pub system_audio: bool,
}

/// Voice activity detection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VadSettings {
    pub sensitivity: SensitivityTier,
    pub calibration_frames: usize,
    pub debounce_ms: u32,
}

/// Segment buffering configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentSettings {
    pub min_duration_ms: u32,
    pub max_duration_ms: u32,
    pub confirmation_grace_ms: u32,
}

/// Remote session configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    pub source_language: String,
    pub target_language: String,
    pub queue_capacity: usize,
}

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Output gain (0.0 to 1.0) applied to synthesized audio.
    pub output_gain: f32,
    /// Whether the user's own voice is monitored locally. Ignored (hard
    /// muted) while translated audio is playing.
    pub passthrough: bool,
}

/// VAD sensitivity tier, mapped to the minimum adaptive threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityTier {
    /// Requires louder speech; for noisy environments.
    Low,
    #[default]
    Medium,
    /// Picks up soft speech; for quiet environments.
    High,
}

impl SensitivityTier {
    /// The floor the adaptive threshold may never drop below.
    pub fn min_threshold(self) -> f32 {
        match self {
            SensitivityTier::Low => defaults::MIN_THRESHOLD * 2.0,
            SensitivityTier::Medium => defaults::MIN_THRESHOLD,
            SensitivityTier::High => defaults::MIN_THRESHOLD / 2.0,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            system_audio: false,
        }
    }
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            sensitivity: SensitivityTier::Medium,
            calibration_frames: defaults::CALIBRATION_FRAMES,
            debounce_ms: defaults::DEBOUNCE_MS,
        }
    }
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            min_duration_ms: defaults::MIN_SEGMENT_MS,
            max_duration_ms: defaults::MAX_SEGMENT_MS,
            confirmation_grace_ms: defaults::CONFIRMATION_GRACE_MS,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            source_language: "auto".to_string(),
            target_language: "en".to_string(),
            queue_capacity: defaults::RESPONSE_QUEUE_CAPACITY,
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            output_gain: 1.0,
            passthrough: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXLATE_SOURCE_LANGUAGE → session.source_language
    /// - VOXLATE_TARGET_LANGUAGE → session.target_language
    /// - VOXLATE_AUDIO_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(lang) = std::env::var("VOXLATE_SOURCE_LANGUAGE")
            && !lang.is_empty()
        {
            self.session.source_language = lang;
        }

        if let Ok(lang) = std::env::var("VOXLATE_TARGET_LANGUAGE")
            && !lang.is_empty()
        {
            self.session.target_language = lang;
        }

        if let Ok(device) = std::env::var("VOXLATE_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxlate/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("voxlate").join("config.toml"))
    }

    /// VAD configuration derived from these settings.
    pub fn vad_config(&self) -> crate::audio::vad::VadConfig {
        crate::audio::vad::VadConfig {
            calibration_frames: self.vad.calibration_frames,
            history_len: defaults::ENERGY_HISTORY,
            min_threshold: self.vad.sensitivity.min_threshold(),
            stddev_factor: defaults::THRESHOLD_STDDEV_FACTOR,
            debounce_ms: self.vad.debounce_ms,
        }
    }

    /// Segment buffer configuration derived from these settings.
    pub fn segment_config(&self) -> crate::pipeline::SegmentBufferConfig {
        crate::pipeline::SegmentBufferConfig {
            min_duration_ms: self.segment.min_duration_ms,
            max_duration_ms: self.segment.max_duration_ms,
            confirmation_grace_ms: self.segment.confirmation_grace_ms,
            sample_rate: self.audio.sample_rate,
            language_hint: (self.session.source_language != "auto")
                .then(|| self.session.source_language.clone()),
        }
    }

    /// Pipeline configuration derived from these settings.
    pub fn pipeline_config(&self) -> crate::pipeline::PipelineConfig {
        crate::pipeline::PipelineConfig {
            vad: self.vad_config(),
            segment: self.segment_config(),
            playback: crate::pipeline::PlaybackConfig {
                passthrough: if self.playback.passthrough {
                    crate::pipeline::PassthroughMode::Passthrough
                } else {
                    crate::pipeline::PassthroughMode::Muted
                },
                output_gain: self.playback.output_gain,
            },
            sample_rate: self.audio.sample_rate,
            ..Default::default()
        }
    }
}
