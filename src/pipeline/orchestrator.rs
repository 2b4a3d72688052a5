//! Translation pipeline that runs from start until stop.
//!
//! Wires capture → VAD → segment buffer → processing queue → playback as
//! independent tokio tasks connected by bounded channels. Shutdown is a
//! cascade: the capture task stops first, which flushes the segment buffer,
//! drains in-flight processing, and lets playback finish, in that order.

use crate::audio::source::{AudioSource, SourceKind};
use crate::audio::vad::{VadConfig, VadEvent, VoiceActivityDetector};
use crate::error::Result;
use crate::pipeline::error::{ErrorReporter, LogReporter, StationError};
use crate::pipeline::playback::{
    AudioOutput, FeedbackGate, PlaybackConfig, PlaybackEvent, PlaybackQueue,
};
use crate::pipeline::segment_buffer::{SegmentBufferConfig, SpeechSegmentBuffer};
use crate::pipeline::segment_queue::{
    SegmentProcessingQueue, SegmentProcessor, SegmentQueueConfig, SegmentQueueHandle,
};
use crate::pipeline::types::{AudioFrame, PipelineEvent, PlaybackChunk};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// VAD configuration
    pub vad: VadConfig,
    /// Segment buffer configuration
    pub segment: SegmentBufferConfig,
    /// Processing queue configuration
    pub queue: SegmentQueueConfig,
    /// Playback configuration
    pub playback: PlaybackConfig,
    /// Sample rate
    pub sample_rate: u32,
    /// Verbosity level (0=quiet, 1=diagnostics)
    pub verbosity: u8,
    /// Channel buffer sizes
    pub frame_buffer: usize,
    pub segment_buffer: usize,
    pub playback_buffer: usize,
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vad: VadConfig::default(),
            segment: SegmentBufferConfig::default(),
            queue: SegmentQueueConfig::default(),
            playback: PlaybackConfig::default(),
            sample_rate: crate::defaults::SAMPLE_RATE,
            verbosity: 0,
            frame_buffer: 1024,
            segment_buffer: crate::defaults::SEGMENT_QUEUE_CAPACITY,
            playback_buffer: crate::defaults::PLAYBACK_QUEUE_CAPACITY,
            event_buffer: 64,
        }
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    running: Arc<AtomicBool>,
    stop_signal: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    events: mpsc::Receiver<PipelineEvent>,
    gate: FeedbackGate,
    playback: PlaybackConfig,
}

impl PipelineHandle {
    /// Returns true if the pipeline is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether translated audio is currently playing.
    pub fn is_playing_audio(&self) -> bool {
        self.gate.is_playing()
    }

    /// Gain the embedding application should apply to monitored input
    /// right now.
    ///
    /// Hard-muted to 0.0 while translated audio is playing or queued; the
    /// configured pass-through preference applies once playback drains.
    pub fn monitor_gain(&self) -> f32 {
        self.playback.monitor_gain(self.gate.is_playing())
    }

    /// Next pipeline event, or `None` once every station has finished.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    /// Stops the pipeline gracefully.
    ///
    /// The capture task exits first; each downstream station then drains
    /// what it already holds: the segment buffer flushes its in-progress
    /// segment and the processing queue finishes in-flight work. Playback
    /// is cleared rather than drained — unplayed audio belongs to the
    /// stopped session and is discarded. After the deadline, remaining
    /// tasks are aborted.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.stop_signal.send(true);

        let deadline = Duration::from_secs(5);
        for task in self.tasks.drain(..) {
            match tokio::time::timeout(deadline, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_panic() => {
                    eprintln!("voxlate: pipeline task panicked: {}", e);
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    eprintln!("voxlate: shutdown timeout, aborting a pipeline task");
                }
            }
        }
    }
}

/// Translation pipeline: AudioSource → VAD → SegmentBuffer → ProcessingQueue
/// → Playback.
pub struct Pipeline {
    config: PipelineConfig,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl Pipeline {
    /// Creates a new pipeline with the default error reporter.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            error_reporter: Arc::new(LogReporter),
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Starts the pipeline.
    ///
    /// # Arguments
    /// * `audio_source` - Audio capture source
    /// * `processor` - Dual-path segment processor (usually session-backed)
    /// * `output` - Sink for translated audio playback
    pub fn start<P, O>(
        self,
        mut audio_source: Box<dyn AudioSource>,
        processor: Arc<P>,
        output: Arc<O>,
    ) -> Result<PipelineHandle>
    where
        P: SegmentProcessor + 'static,
        O: AudioOutput + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let gate = FeedbackGate::new();
        let (stop_tx, stop_rx) = watch::channel(false);
        let playback_config = self.config.playback.clone();

        let (frame_tx, frame_rx) = mpsc::channel(self.config.frame_buffer);
        let (ready_tx, mut ready_rx) = mpsc::channel(self.config.segment_buffer);
        let (segment_tx, segment_rx) = mpsc::channel(self.config.segment_buffer);
        let (processed_tx, mut processed_rx) = mpsc::channel(self.config.segment_buffer);
        let (chunk_tx, chunk_rx) = mpsc::channel(self.config.playback_buffer);
        let (playback_event_tx, mut playback_event_rx) = mpsc::channel(self.config.event_buffer);
        let (event_tx, event_rx) = mpsc::channel(self.config.event_buffer);

        // Start capture before spawning anything so a bad device fails the
        // whole start instead of a background task.
        audio_source.start()?;

        let mut tasks = Vec::new();

        // Capture + VAD task. System-audio frames are dropped at the door
        // while translated audio is playing, before they can re-enter the
        // pipeline as input.
        let capture_running = running.clone();
        let capture_gate = gate.clone();
        let capture_events = event_tx.clone();
        let capture_reporter = self.error_reporter.clone();
        let verbosity = self.config.verbosity;
        let mut vad = VoiceActivityDetector::new(self.config.vad.clone());
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(16));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let source_is_finite = audio_source.is_finite();
            let source_kind = audio_source.kind();
            let mut sequence: u64 = 0;
            let mut consecutive_errors: u32 = 0;
            const MAX_CONSECUTIVE_ERRORS: u32 = 10;

            while capture_running.load(Ordering::SeqCst) {
                interval.tick().await;

                let samples = match audio_source.read_samples() {
                    Ok(s) => {
                        consecutive_errors = 0;
                        s
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                            capture_reporter.report(
                                "capture",
                                &StationError::Fatal(format!(
                                    "audio capture failed {consecutive_errors} times in a row: {e}"
                                )),
                            );
                            let _ = capture_events
                                .send(PipelineEvent::Failure {
                                    message: "audio capture failed repeatedly".to_string(),
                                })
                                .await;
                            break;
                        }
                        continue;
                    }
                };

                if samples.is_empty() {
                    if source_is_finite {
                        break;
                    }
                    // Live source: empty reads are normal while the device
                    // warms up.
                    continue;
                }

                if source_kind == SourceKind::SystemAudio && capture_gate.is_playing() {
                    // Our own translation is playing through this path.
                    continue;
                }

                let frame = AudioFrame::new(samples, Instant::now(), sequence);
                sequence += 1;

                let analysis = vad.analyze(&frame.samples);
                match analysis.event {
                    VadEvent::CalibrationComplete => {
                        let _ = capture_events
                            .send(PipelineEvent::Calibrated {
                                noise_floor: vad.noise_floor(),
                                threshold: vad.threshold(),
                            })
                            .await;
                    }
                    VadEvent::SpeechStart => {
                        if verbosity >= 1 {
                            eprintln!("voxlate: speech start (energy {:.4})", analysis.energy);
                        }
                        let _ = capture_events.send(PipelineEvent::SpeechStart).await;
                    }
                    _ => {}
                }

                if frame_tx.send((frame, analysis)).await.is_err() {
                    break;
                }
            }

            if let Err(e) = audio_source.stop() {
                eprintln!("voxlate: failed to stop audio capture: {e}");
            }
        }));

        // Segment buffer station.
        let buffer = SpeechSegmentBuffer::new(self.config.segment.clone());
        tasks.push(tokio::spawn(buffer.run(frame_rx, ready_tx)));

        // Dispatch adapter: admits segments into the queue without blocking
        // the capture path. A full queue drops the segment and says so.
        let dispatch_events = event_tx.clone();
        let dispatch_reporter = self.error_reporter.clone();
        let submit = SegmentQueueHandle::new(segment_tx);
        tasks.push(tokio::spawn(async move {
            while let Some((segment, _reason)) = ready_rx.recv().await {
                let id = segment.id;
                let duration_ms = segment.duration_ms;
                if submit.enqueue(segment).is_some() {
                    let _ = dispatch_events
                        .send(PipelineEvent::SegmentDispatched { id, duration_ms })
                        .await;
                } else {
                    dispatch_reporter.report(
                        "segment-queue",
                        &StationError::Recoverable(format!(
                            "queue full, dropped segment {id}"
                        )),
                    );
                    let _ = dispatch_events.send(PipelineEvent::QueueFull { id }).await;
                }
            }
        }));

        // Processing queue station.
        let queue = SegmentProcessingQueue::new(self.config.queue.clone(), processor);
        tasks.push(tokio::spawn(queue.run(segment_rx, processed_tx)));

        // Completion adapter: reports results, routes audio to playback.
        let completion_events = event_tx.clone();
        let completion_reporter = self.error_reporter.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(processed) = processed_rx.recv().await {
                for message in [&processed.transcript_error, &processed.audio_error]
                    .into_iter()
                    .flatten()
                {
                    completion_reporter
                        .report("segment-queue", &StationError::Recoverable(message.clone()));
                }

                let segment = processed.segment;
                let _ = completion_events
                    .send(PipelineEvent::SegmentComplete {
                        id: segment.id,
                        transcript: segment.results.transcript.clone(),
                        audio: segment.results.audio.is_some(),
                    })
                    .await;

                if let Some(audio) = segment.results.audio
                    && chunk_tx
                        .send(PlaybackChunk::new(segment.id, audio))
                        .await
                        .is_err()
                {
                    return;
                }
            }
        }));

        // Playback station. On stop it clears instead of draining.
        let playback = PlaybackQueue::new(output, gate.clone());
        tasks.push(tokio::spawn(playback.run(chunk_rx, playback_event_tx, stop_rx)));

        // Playback event adapter.
        let playback_events = event_tx;
        let playback_reporter = self.error_reporter;
        tasks.push(tokio::spawn(async move {
            while let Some(event) = playback_event_rx.recv().await {
                let forwarded = match event {
                    PlaybackEvent::Started => Some(PipelineEvent::PlaybackStarted),
                    PlaybackEvent::Drained => Some(PipelineEvent::PlaybackDrained),
                    PlaybackEvent::ChunkSkipped { sequence, message } => {
                        playback_reporter.report(
                            "playback",
                            &StationError::Recoverable(format!(
                                "chunk {} skipped: {}",
                                sequence, message
                            )),
                        );
                        Some(PipelineEvent::Failure {
                            message: format!("playback skipped chunk {}", sequence),
                        })
                    }
                    PlaybackEvent::ChunkDone { .. } => None,
                };
                if let Some(event) = forwarded
                    && playback_events.send(event).await.is_err()
                {
                    return;
                }
            }
        }));

        Ok(PipelineHandle {
            running,
            stop_signal: stop_tx,
            tasks,
            events: event_rx,
            gate,
            playback: playback_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::{FramePhase, MockAudioSource};
    use crate::error::VoxlateError;
    use crate::pipeline::playback::PassthroughMode;
    use crate::pipeline::segment_queue::SegmentProcessor;
    use crate::pipeline::types::SpeechSegment;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct EchoProcessor {
        transcribed: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl SegmentProcessor for EchoProcessor {
        async fn transcribe(&self, segment: &SpeechSegment) -> Result<String> {
            self.transcribed.lock().unwrap().push(segment.id);
            Ok(format!("segment {} transcribed", segment.id))
        }

        async fn synthesize(&self, segment: &SpeechSegment) -> Result<Vec<u8>> {
            Ok(vec![segment.id as u8; 16])
        }
    }

    struct RecordingOutput {
        played: Mutex<Vec<Vec<u8>>>,
    }

    impl RecordingOutput {
        fn new() -> Self {
            Self {
                played: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AudioOutput for RecordingOutput {
        async fn play(&self, payload: &[u8]) -> Result<()> {
            self.played.lock().unwrap().push(payload.to_vec());
            Ok(())
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            vad: VadConfig {
                calibration_frames: 3,
                history_len: 2,
                min_threshold: 0.01,
                stddev_factor: 3.0,
                debounce_ms: 50,
            },
            segment: SegmentBufferConfig {
                min_duration_ms: 20,
                max_duration_ms: 30_000,
                confirmation_grace_ms: 50,
                sample_rate: 16000,
                language_hint: None,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.frame_buffer, 1024);
        assert_eq!(config.segment_buffer, 8);
        assert_eq!(config.playback_buffer, 64);
        assert_eq!(config.verbosity, 0);
    }

    #[tokio::test]
    async fn test_start_fails_when_audio_source_fails() {
        let pipeline = Pipeline::new(fast_config());
        let source = Box::new(
            MockAudioSource::new()
                .with_start_failure()
                .with_error_message("device busy"),
        );

        let result = pipeline.start(source, Arc::new(EchoProcessor::default()), Arc::new(RecordingOutput::new()));
        match result {
            Err(VoxlateError::AudioCapture { message }) => assert_eq!(message, "device busy"),
            _ => panic!("expected AudioCapture error"),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_speech_to_playback() {
        let pipeline = Pipeline::new(fast_config());

        // 3 quiet calibration frames, 10 loud frames (100ms speech), then
        // silence long enough for the 50ms debounce.
        let phases = vec![
            FramePhase {
                samples: vec![0i16; 160],
                count: 3,
            },
            FramePhase {
                samples: vec![12000i16; 160],
                count: 10,
            },
            FramePhase {
                samples: vec![0i16; 160],
                count: 20,
            },
        ];
        let source = Box::new(MockAudioSource::new().with_frame_sequence(phases));
        let output = Arc::new(RecordingOutput::new());

        let mut handle = pipeline
            .start(source, Arc::new(EchoProcessor::default()), Arc::clone(&output))
            .unwrap();
        assert!(handle.is_running());

        // Collect events until the playback drains or the stations finish.
        let mut saw_calibrated = false;
        let mut saw_speech_start = false;
        let mut saw_dispatched = false;
        let mut transcript = None;
        let mut saw_drained = false;

        let collect = async {
            while let Some(event) = handle.next_event().await {
                match event {
                    PipelineEvent::Calibrated { .. } => saw_calibrated = true,
                    PipelineEvent::SpeechStart => saw_speech_start = true,
                    PipelineEvent::SegmentDispatched { .. } => saw_dispatched = true,
                    PipelineEvent::SegmentComplete {
                        transcript: text, ..
                    } => transcript = text,
                    PipelineEvent::PlaybackDrained => {
                        saw_drained = true;
                        break;
                    }
                    _ => {}
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(10), collect)
            .await
            .expect("pipeline did not reach playback within the deadline");

        assert!(saw_calibrated, "calibration event missing");
        assert!(saw_speech_start, "speech start event missing");
        assert!(saw_dispatched, "dispatch event missing");
        assert_eq!(transcript.as_deref(), Some("segment 0 transcribed"));
        assert!(saw_drained);
        assert_eq!(output.played.lock().unwrap().as_slice(), &[vec![0u8; 16]]);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_flushes_segment_but_discards_unplayed_audio() {
        let mut config = fast_config();
        // Long debounce so the segment is still buffering at stop time.
        config.vad.debounce_ms = 10_000;

        let pipeline = Pipeline::new(config);
        let phases = vec![
            FramePhase {
                samples: vec![0i16; 160],
                count: 3,
            },
            FramePhase {
                samples: vec![12000i16; 160],
                count: 10,
            },
        ];
        // Live source: keeps returning empty after the script so the
        // capture loop stays up until stop().
        let source = Box::new(
            MockAudioSource::new()
                .with_frame_sequence(phases)
                .as_live_source(),
        );
        let processor = Arc::new(EchoProcessor::default());
        let output = Arc::new(RecordingOutput::new());

        let mut handle = pipeline
            .start(source, Arc::clone(&processor), Arc::clone(&output))
            .unwrap();

        // Wait until speech has been seen, then stop mid-utterance.
        let wait_speech = async {
            while let Some(event) = handle.next_event().await {
                if matches!(event, PipelineEvent::SpeechStart) {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait_speech)
            .await
            .expect("speech never started");

        // Frames arrive every 16ms; let the 10 loud frames flow through.
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.stop().await;

        // The buffered speech was flushed and processed during shutdown,
        // but its audio was discarded, not played after the stop.
        assert_eq!(processor.transcribed.lock().unwrap().as_slice(), &[0]);
        assert!(output.played.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_system_audio_frames_dropped_while_playing() {
        // With the gate raised, a system-audio source's frames never reach
        // the VAD, so no speech (and no segment) is ever produced.
        let pipeline = Pipeline::new(fast_config());
        let source = Box::new(
            MockAudioSource::new()
                .with_kind(SourceKind::SystemAudio)
                .with_frame_sequence(vec![FramePhase {
                    samples: vec![12000i16; 160],
                    count: 20,
                }]),
        );
        let output = Arc::new(RecordingOutput::new());

        let mut handle = pipeline
            .start(source, Arc::new(EchoProcessor::default()), Arc::clone(&output))
            .unwrap();

        // Raise the gate before any frame is processed.
        handle.gate.raise();

        // Give the capture loop time to run through every scripted frame.
        tokio::time::sleep(Duration::from_millis(600)).await;
        handle.stop().await;

        assert!(output.played.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_system_audio_capture_resumes_after_gate_lowers() {
        // Two speech bursts from a system-audio source, the first entirely
        // inside the gated window. Only the second reaches playback.
        let pipeline = Pipeline::new(fast_config());
        let phases = vec![
            // Calibration, then a long quiet window to raise the gate in.
            FramePhase {
                samples: vec![0i16; 160],
                count: 3,
            },
            FramePhase {
                samples: vec![0i16; 160],
                count: 40,
            },
            // Burst one: played back audio, must be dropped.
            FramePhase {
                samples: vec![12000i16; 160],
                count: 20,
            },
            // Wide quiet window to lower the gate in.
            FramePhase {
                samples: vec![0i16; 160],
                count: 60,
            },
            // Burst two: real speech after playback drained.
            FramePhase {
                samples: vec![12000i16; 160],
                count: 20,
            },
            FramePhase {
                samples: vec![0i16; 160],
                count: 30,
            },
        ];
        let source = Box::new(
            MockAudioSource::new()
                .with_kind(SourceKind::SystemAudio)
                .with_frame_sequence(phases),
        );
        let output = Arc::new(RecordingOutput::new());

        let mut handle = pipeline
            .start(source, Arc::new(EchoProcessor::default()), Arc::clone(&output))
            .unwrap();

        // Raise the gate as soon as calibration finishes: well within the
        // 640ms quiet window that precedes the first burst.
        let wait_calibrated = async {
            while let Some(event) = handle.next_event().await {
                if matches!(event, PipelineEvent::Calibrated { .. }) {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait_calibrated)
            .await
            .expect("calibration never completed");
        handle.gate.raise();

        // Hold the gate through the first burst, then lower it inside the
        // 960ms quiet stretch before the second burst.
        tokio::time::sleep(Duration::from_millis(1400)).await;
        handle.gate.lower();

        let mut speech_starts = 0;
        let collect = async {
            while let Some(event) = handle.next_event().await {
                match event {
                    PipelineEvent::SpeechStart => speech_starts += 1,
                    PipelineEvent::PlaybackDrained => break,
                    _ => {}
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(10), collect)
            .await
            .expect("second burst never reached playback");
        handle.stop().await;

        assert_eq!(speech_starts, 1, "gated burst should not start speech");
        assert_eq!(output.played.lock().unwrap().len(), 1);
    }

    #[derive(Default)]
    struct CollectingReporter {
        reports: Mutex<Vec<(String, bool)>>,
    }

    impl ErrorReporter for CollectingReporter {
        fn report(&self, station: &str, error: &StationError) {
            self.reports
                .lock()
                .unwrap()
                .push((station.to_string(), error.is_fatal()));
        }
    }

    #[tokio::test]
    async fn test_repeated_capture_failures_reported_fatal() {
        let reporter = Arc::new(CollectingReporter::default());
        let pipeline = Pipeline::new(fast_config())
            .with_error_reporter(Arc::clone(&reporter) as Arc<dyn ErrorReporter>);
        let source = Box::new(
            MockAudioSource::new()
                .with_read_failure()
                .with_error_message("device unplugged"),
        );

        let mut handle = pipeline
            .start(
                source,
                Arc::new(EchoProcessor::default()),
                Arc::new(RecordingOutput::new()),
            )
            .unwrap();

        let wait_failure = async {
            while let Some(event) = handle.next_event().await {
                if matches!(event, PipelineEvent::Failure { .. }) {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), wait_failure)
            .await
            .expect("capture failure never surfaced");
        handle.stop().await;

        let reports = reporter.reports.lock().unwrap();
        assert!(
            reports
                .iter()
                .any(|(station, fatal)| station == "capture" && *fatal)
        );
    }

    #[tokio::test]
    async fn test_monitor_gain_follows_the_gate() {
        let mut config = fast_config();
        config.playback.passthrough = PassthroughMode::Passthrough;
        config.playback.output_gain = 0.8;

        let pipeline = Pipeline::new(config);
        let handle = pipeline
            .start(
                Box::new(MockAudioSource::new()),
                Arc::new(EchoProcessor::default()),
                Arc::new(RecordingOutput::new()),
            )
            .unwrap();

        assert_eq!(handle.monitor_gain(), 0.8);
        handle.gate.raise();
        assert_eq!(handle.monitor_gain(), 0.0);
        handle.gate.lower();
        assert_eq!(handle.monitor_gain(), 0.8);
        handle.stop().await;
    }
}
