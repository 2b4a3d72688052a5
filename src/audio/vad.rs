//! Voice Activity Detection (VAD) module.
//!
//! Detects speech activity in audio streams using RMS-based thresholding with
//! a self-calibrated noise floor. The first frames of a capture session form a
//! calibration window; afterwards classification runs on a smoothed rolling
//! energy window, with a debounced speech-end so brief dips mid-sentence do
//! not fragment an utterance.

use crate::defaults;
use std::collections::VecDeque;
use std::time::Instant;

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Configuration for Voice Activity Detection.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// Number of initial frames used to calibrate the noise floor.
    pub calibration_frames: usize,
    /// Length of the rolling energy window used for smoothing.
    pub history_len: usize,
    /// Floor the adaptive threshold may never drop below.
    pub min_threshold: f32,
    /// Multiplier on the calibration stddev above the noise floor.
    pub stddev_factor: f32,
    /// Continuous sub-threshold duration before speech ends (milliseconds).
    pub debounce_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            calibration_frames: defaults::CALIBRATION_FRAMES,
            history_len: defaults::ENERGY_HISTORY,
            min_threshold: defaults::MIN_THRESHOLD,
            stddev_factor: defaults::THRESHOLD_STDDEV_FACTOR,
            debounce_ms: defaults::DEBOUNCE_MS,
        }
    }
}

/// Current phase of the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadPhase {
    /// Collecting calibration frames; never reports speech.
    Calibrating,
    /// Calibrated, no speech detected.
    Idle,
    /// Speech is being detected.
    Speaking,
    /// Silence detected during speech, waiting out the debounce window.
    MaybeSilence,
}

/// Events emitted by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    /// Frame consumed as calibration data.
    Calibrating,
    /// Calibration window complete; thresholds are now set.
    CalibrationComplete,
    /// Speech has started.
    SpeechStart,
    /// Ongoing speech detected.
    Speech,
    /// No speech detected (or silence during the debounce window).
    Silence,
    /// Speech has ended after the debounce window elapsed.
    SpeechEnd,
}

/// Result of analyzing one frame.
#[derive(Debug, Clone, Copy)]
pub struct VadAnalysis {
    /// The VAD event for this frame.
    pub event: VadEvent,
    /// Instantaneous RMS energy (0.0 to 1.0).
    pub energy: f32,
    /// Rolling-window average energy used for classification.
    pub smoothed_energy: f32,
    /// Current adaptive threshold.
    pub threshold: f32,
    /// Whether the detector currently considers speech active.
    pub is_speaking: bool,
    /// Milliseconds of silence accumulated in the debounce window.
    pub silence_ms: u32,
    /// The detector's internal speech timer: milliseconds since speech
    /// started, excluding the debounce window. Zero when not speaking.
    pub speech_ms: u32,
}

/// Self-calibrating voice activity detector.
pub struct VoiceActivityDetector<C: Clock = SystemClock> {
    config: VadConfig,
    phase: VadPhase,
    calibration_energies: Vec<f32>,
    noise_floor: f32,
    threshold: f32,
    history: VecDeque<f32>,
    silence_start: Option<Instant>,
    speech_start: Option<Instant>,
    clock: C,
}

impl<C: Clock> VoiceActivityDetector<C> {
    /// Creates a new detector with the given configuration and clock.
    pub fn with_clock(config: VadConfig, clock: C) -> Self {
        Self {
            config,
            phase: VadPhase::Calibrating,
            calibration_energies: Vec::with_capacity(config.calibration_frames),
            noise_floor: 0.0,
            threshold: config.min_threshold,
            history: VecDeque::with_capacity(config.history_len),
            silence_start: None,
            speech_start: None,
            clock,
        }
    }

    /// Analyzes one frame of 16-bit PCM samples.
    pub fn analyze(&mut self, samples: &[i16]) -> VadAnalysis {
        let energy = calculate_rms(samples);

        if self.phase == VadPhase::Calibrating {
            return self.calibrate(energy);
        }

        // Classify on the smoothed energy, not the instantaneous one.
        if self.history.len() == self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back(energy);
        let smoothed = self.smoothed_energy();

        let is_speech = smoothed > self.threshold;
        let now = self.clock.now();

        // Speech timer: speech start → the last above-threshold frame.
        let elapsed_since = |start: Option<Instant>, until: Instant| {
            start
                .map(|s| until.duration_since(s).as_millis() as u32)
                .unwrap_or(0)
        };

        let (event, silence_ms, speech_ms) = match self.phase {
            VadPhase::Idle => {
                if is_speech {
                    self.phase = VadPhase::Speaking;
                    self.silence_start = None;
                    self.speech_start = Some(now);
                    (VadEvent::SpeechStart, 0, 0)
                } else {
                    (VadEvent::Silence, 0, 0)
                }
            }
            VadPhase::Speaking => {
                if is_speech {
                    (VadEvent::Speech, 0, elapsed_since(self.speech_start, now))
                } else {
                    self.phase = VadPhase::MaybeSilence;
                    self.silence_start = Some(now);
                    (VadEvent::Silence, 0, elapsed_since(self.speech_start, now))
                }
            }
            VadPhase::MaybeSilence => {
                if is_speech {
                    self.phase = VadPhase::Speaking;
                    self.silence_start = None;
                    (VadEvent::Speech, 0, elapsed_since(self.speech_start, now))
                } else {
                    let silence_elapsed = elapsed_since(self.silence_start, now);
                    // Frozen at the instant silence began.
                    let spoken = self
                        .silence_start
                        .map(|s| elapsed_since(self.speech_start, s))
                        .unwrap_or(0);

                    if silence_elapsed >= self.config.debounce_ms {
                        self.phase = VadPhase::Idle;
                        self.silence_start = None;
                        self.speech_start = None;
                        (VadEvent::SpeechEnd, silence_elapsed, spoken)
                    } else {
                        (VadEvent::Silence, silence_elapsed, spoken)
                    }
                }
            }
            VadPhase::Calibrating => unreachable!("handled above"),
        };

        VadAnalysis {
            event,
            energy,
            smoothed_energy: smoothed,
            threshold: self.threshold,
            is_speaking: self.is_speaking(),
            silence_ms,
            speech_ms,
        }
    }

    /// Consumes one calibration frame, deriving thresholds on the last one.
    fn calibrate(&mut self, energy: f32) -> VadAnalysis {
        self.calibration_energies.push(energy);

        let event = if self.calibration_energies.len() >= self.config.calibration_frames {
            let n = self.calibration_energies.len() as f32;
            let mean = self.calibration_energies.iter().sum::<f32>() / n;
            let variance = self
                .calibration_energies
                .iter()
                .map(|e| (e - mean) * (e - mean))
                .sum::<f32>()
                / n;
            let stddev = variance.sqrt();

            self.noise_floor = mean;
            self.threshold =
                (mean + self.config.stddev_factor * stddev).max(self.config.min_threshold);
            self.calibration_energies.clear();
            self.phase = VadPhase::Idle;
            VadEvent::CalibrationComplete
        } else {
            VadEvent::Calibrating
        };

        VadAnalysis {
            event,
            energy,
            smoothed_energy: energy,
            threshold: self.threshold,
            is_speaking: false,
            silence_ms: 0,
            speech_ms: 0,
        }
    }

    /// Average of the rolling energy window.
    fn smoothed_energy(&self) -> f32 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }

    /// Returns the current phase.
    pub fn phase(&self) -> VadPhase {
        self.phase
    }

    /// Whether speech is currently considered active. Always false while
    /// calibrating, including when calibration never completes.
    pub fn is_speaking(&self) -> bool {
        matches!(self.phase, VadPhase::Speaking | VadPhase::MaybeSilence)
    }

    /// The calibrated noise floor (0.0 until calibration completes).
    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }

    /// The current adaptive threshold. Never below the configured minimum.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Re-enters calibration and clears all history. Must be called whenever
    /// the audio source changes.
    pub fn reset(&mut self) {
        self.phase = VadPhase::Calibrating;
        self.calibration_energies.clear();
        self.noise_floor = 0.0;
        self.threshold = self.config.min_threshold;
        self.history.clear();
        self.silence_start = None;
        self.speech_start = None;
    }
}

impl VoiceActivityDetector<SystemClock> {
    /// Creates a new detector with the given configuration using the system clock.
    pub fn new(config: VadConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// Returns a normalized value (0.0 to 1.0), where 0.0 is silence and
/// ~0.707 is a full-scale sine wave.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}


#[cfg(test)]
mod tests {
    use super::test_clock::MockClock;
    use super::*;
    use std::time::Duration;

    fn small_config() -> VadConfig {
        VadConfig {
            calibration_frames: 5,
            history_len: 3,
            min_threshold: 0.01,
            stddev_factor: 3.0,
            debounce_ms: 100,
        }
    }

    fn make_silence(count: usize) -> Vec<i16> {
        vec![0i16; count]
    }

    fn make_speech(count: usize, amplitude: i16) -> Vec<i16> {
        vec![amplitude; count]
    }

    /// Feed silent calibration frames until calibration completes.
    fn calibrate<C: Clock>(vad: &mut VoiceActivityDetector<C>, frames: usize) {
        let silence = make_silence(160);
        for i in 0..frames {
            let analysis = vad.analyze(&silence);
            if i + 1 < frames {
                assert_eq!(analysis.event, VadEvent::Calibrating);
            } else {
                assert_eq!(analysis.event, VadEvent::CalibrationComplete);
            }
        }
    }

    #[test]
    fn test_rms_silence_is_zero() {
        assert_eq!(calculate_rms(&make_silence(1000)), 0.0);
    }

    #[test]
    fn test_rms_max_amplitude() {
        let rms = calculate_rms(&make_speech(1000, i16::MAX));
        assert!((rms - 1.0).abs() < 0.001, "RMS should be ~1.0, got {}", rms);
    }

    #[test]
    fn test_rms_empty_samples() {
        assert_eq!(calculate_rms(&[]), 0.0);
    }

    #[test]
    fn test_starts_calibrating() {
        let vad = VoiceActivityDetector::new(small_config());
        assert_eq!(vad.phase(), VadPhase::Calibrating);
        assert!(!vad.is_speaking());
    }

    #[test]
    fn test_never_speaks_during_calibration() {
        let mut vad = VoiceActivityDetector::new(small_config());

        // Loud frames during calibration must not register as speech.
        let loud = make_speech(160, 10000);
        for _ in 0..4 {
            let analysis = vad.analyze(&loud);
            assert!(!analysis.is_speaking);
            assert_eq!(analysis.event, VadEvent::Calibrating);
        }
    }

    #[test]
    fn test_calibration_sets_threshold_from_noise() {
        let mut vad = VoiceActivityDetector::new(small_config());

        // Noisy room: alternate energies around 0.03
        for i in 0..5 {
            let amplitude = if i % 2 == 0 { 900 } else { 1100 };
            vad.analyze(&make_speech(160, amplitude));
        }

        assert_eq!(vad.phase(), VadPhase::Idle);
        assert!(vad.noise_floor() > 0.0);
        // mean + 3*stddev must dominate the configured minimum here
        assert!(vad.threshold() > vad.noise_floor());
        assert!(vad.threshold() >= 0.01);
    }

    #[test]
    fn test_silent_calibration_keeps_minimum_threshold() {
        let mut vad = VoiceActivityDetector::new(small_config());
        calibrate(&mut vad, 5);

        // Perfectly silent window: mean and stddev are zero, so the
        // threshold must clamp to the configured minimum.
        assert_eq!(vad.noise_floor(), 0.0);
        assert_eq!(vad.threshold(), 0.01);
    }

    #[test]
    fn test_speech_detected_after_calibration() {
        let mut vad = VoiceActivityDetector::new(small_config());
        calibrate(&mut vad, 5);

        let analysis = vad.analyze(&make_speech(160, 3000));
        assert_eq!(analysis.event, VadEvent::SpeechStart);
        assert!(analysis.is_speaking);
        assert_eq!(vad.phase(), VadPhase::Speaking);
    }

    #[test]
    fn test_smoothing_suppresses_single_frame_spike() {
        let config = VadConfig {
            history_len: 10,
            ..small_config()
        };
        let mut vad = VoiceActivityDetector::new(config);
        calibrate(&mut vad, 5);

        // Build up a quiet history first.
        for _ in 0..9 {
            vad.analyze(&make_silence(160));
        }

        // One loud frame averaged over 10 quiet ones stays sub-threshold.
        let analysis = vad.analyze(&make_speech(160, 2000));
        assert_eq!(analysis.event, VadEvent::Silence);
        assert!(!analysis.is_speaking);
        assert!(analysis.energy > analysis.smoothed_energy);
    }

    #[test]
    fn test_debounced_speech_end() {
        let clock = MockClock::new();
        let mut vad = VoiceActivityDetector::with_clock(small_config(), clock.clone());
        calibrate(&mut vad, 5);

        vad.analyze(&make_speech(160, 3000));
        assert_eq!(vad.phase(), VadPhase::Speaking);

        // Silence enters the debounce window but does not end speech yet.
        // (history_len 3 means the window average drops quickly)
        vad.analyze(&make_silence(160));
        vad.analyze(&make_silence(160));
        vad.analyze(&make_silence(160));
        assert_eq!(vad.phase(), VadPhase::MaybeSilence);
        assert!(vad.is_speaking(), "still speaking inside debounce window");

        clock.advance(Duration::from_millis(150));
        let analysis = vad.analyze(&make_silence(160));
        assert_eq!(analysis.event, VadEvent::SpeechEnd);
        assert!(!analysis.is_speaking);
        assert_eq!(vad.phase(), VadPhase::Idle);
    }

    #[test]
    fn test_brief_dip_does_not_end_speech() {
        let clock = MockClock::new();
        let mut vad = VoiceActivityDetector::with_clock(small_config(), clock.clone());
        calibrate(&mut vad, 5);

        vad.analyze(&make_speech(160, 3000));

        // Dip below threshold briefly...
        vad.analyze(&make_silence(160));
        vad.analyze(&make_silence(160));
        vad.analyze(&make_silence(160));
        clock.advance(Duration::from_millis(50));

        // ...then resume before the debounce elapses.
        let analysis = vad.analyze(&make_speech(160, 3000));
        assert_eq!(analysis.event, VadEvent::Speech);
        assert_eq!(vad.phase(), VadPhase::Speaking);
    }

    #[test]
    fn test_reset_reenters_calibration() {
        let mut vad = VoiceActivityDetector::new(small_config());
        calibrate(&mut vad, 5);
        vad.analyze(&make_speech(160, 3000));
        assert!(vad.is_speaking());

        vad.reset();
        assert_eq!(vad.phase(), VadPhase::Calibrating);
        assert!(!vad.is_speaking());
        assert_eq!(vad.noise_floor(), 0.0);

        // Loud input right after reset is calibration data, not speech.
        let analysis = vad.analyze(&make_speech(160, 3000));
        assert_eq!(analysis.event, VadEvent::Calibrating);
        assert!(!analysis.is_speaking);
    }

    #[test]
    fn test_speech_timer_excludes_debounce_window() {
        let clock = MockClock::new();
        let mut vad = VoiceActivityDetector::with_clock(small_config(), clock.clone());
        calibrate(&mut vad, 5);

        vad.analyze(&make_speech(160, 3000));
        clock.advance(Duration::from_millis(200));
        let analysis = vad.analyze(&make_speech(160, 3000));
        assert_eq!(analysis.speech_ms, 200);

        // Three silence frames drain the smoothing window; the timer freezes
        // at the instant silence began.
        vad.analyze(&make_silence(160));
        vad.analyze(&make_silence(160));
        vad.analyze(&make_silence(160));
        clock.advance(Duration::from_millis(150));
        let analysis = vad.analyze(&make_silence(160));
        assert_eq!(analysis.event, VadEvent::SpeechEnd);
        assert_eq!(analysis.speech_ms, 200, "debounce silence is not speech time");
    }

    #[test]
    fn test_speech_start_is_immediate_once_window_crosses() {
        let mut vad = VoiceActivityDetector::new(small_config());
        calibrate(&mut vad, 5);

        // history_len is 3; three loud frames push the average over.
        let loud = make_speech(160, 3000);
        let first = vad.analyze(&loud);
        // Already above threshold: 1-frame window average equals the frame.
        assert_eq!(first.event, VadEvent::SpeechStart);
    }
}
