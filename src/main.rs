use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::time::{Duration, Instant};
use voxlate::audio::capture::{CpalAudioSource, list_devices};
use voxlate::audio::vad::{VadEvent, VoiceActivityDetector};
use voxlate::cli::{Cli, Commands};
use voxlate::config::Config;
use voxlate::lock::CaptureLock;
use voxlate::AudioSource;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            Cli::command().print_help()?;
            println!();
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::MicCheck { seconds }) => {
            let config = load_config(&cli)?;
            run_mic_check(&config, cli.device.as_deref(), seconds, cli.verbose)?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        },
    };
    config = config.with_env_overrides();

    if let Some(device) = &cli.device {
        config.audio.device = Some(device.clone());
    }
    if let Some(lang) = &cli.source_language {
        config.session.source_language = lang.clone();
    }
    if let Some(lang) = &cli.target_language {
        config.session.target_language = lang.clone();
    }

    Ok(config)
}

fn list_audio_devices() -> Result<()> {
    let devices = list_devices()?;
    if devices.is_empty() {
        println!("No audio input devices found.");
        return Ok(());
    }
    println!("Available audio input devices:");
    for device in devices {
        println!("  {}", device);
    }
    Ok(())
}

/// Calibrates against ambient noise and prints live speech detection.
fn run_mic_check(config: &Config, device: Option<&str>, seconds: u64, verbose: u8) -> Result<()> {
    let _lock = CaptureLock::acquire(CaptureLock::default_path(), "voxlate mic-check")?;

    let mut source = CpalAudioSource::new(device.or(config.audio.device.as_deref()))?;
    let mut vad = VoiceActivityDetector::new(config.vad_config());

    source.start()?;
    println!("Listening for {seconds}s... stay quiet during calibration, then speak.");

    let deadline = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(16));
        let samples = source.read_samples()?;
        if samples.is_empty() {
            continue;
        }

        let analysis = vad.analyze(&samples);
        match analysis.event {
            VadEvent::CalibrationComplete => {
                println!(
                    "Calibrated: noise floor {:.4}, threshold {:.4}",
                    vad.noise_floor(),
                    vad.threshold()
                );
            }
            VadEvent::SpeechStart => println!("Speech detected"),
            VadEvent::SpeechEnd => {
                println!("Speech ended ({} ms)", analysis.speech_ms);
            }
            _ => {}
        }
        if verbose >= 1 && vad.is_speaking() {
            eprintln!(
                "  energy {:.4} (threshold {:.4})",
                analysis.smoothed_energy, analysis.threshold
            );
        }
    }

    source.stop()?;
    println!("Mic check complete.");
    Ok(())
}
