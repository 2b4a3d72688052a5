//! Command-line interface for voxlate
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Real-time speech translation client
#[derive(Parser, Debug)]
#[command(name = "voxlate", version, about = "Real-time speech translation client")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: levels + events, -vv: full diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device (e.g., hw:0)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Source language, e.g. en
    #[arg(long, value_name = "LANG")]
    pub source_language: Option<String>,

    /// Target language, e.g. de
    #[arg(long, value_name = "LANG")]
    pub target_language: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,

    /// Calibrate against the microphone and show live speech detection
    MicCheck {
        /// How long to listen, in seconds
        #[arg(long, short = 's', value_name = "SECONDS", default_value = "10")]
        seconds: u64,
    },
}
