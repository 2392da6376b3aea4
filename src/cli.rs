//! Command-line interface for voxeval
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Offline streaming speech transcription
#[derive(Parser, Debug)]
#[command(name = "voxeval", version, about = "Offline streaming speech transcription")]
pub struct Cli {
    /// Subcommand to execute (default: listen)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug log, -vv: per-frame trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Model directory (overrides config and VOXEVAL_MODEL_PATH)
    #[arg(long, global = true, value_name = "DIR")]
    pub model: Option<PathBuf>,

    /// Audio input device name
    #[arg(long, global = true, value_name = "DEVICE")]
    pub device: Option<String>,
}

/// Parse a duration such as `30s`, `5m` or a bare number of seconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe the microphone; type start, stop or quit (empty line toggles)
    Listen {
        /// Print events as JSON lines on stdout
        #[arg(long)]
        json: bool,

        /// Record once for this long, then exit. Examples: 10s, 2m
        #[arg(long = "for", value_name = "DURATION", value_parser = parse_duration)]
        duration: Option<Duration>,
    },

    /// Transcribe WAV files offline
    Transcribe {
        /// 16-bit PCM WAV files
        #[arg(required = true, value_name = "WAV")]
        files: Vec<PathBuf>,

        /// Print one JSON document per file
        #[arg(long)]
        json: bool,
    },

    /// List available audio input devices
    Devices,

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default configuration file path
    Path,
}
