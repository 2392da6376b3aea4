use anyhow::Result;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use voxeval::app::{apply_overrides, run_listen, run_transcribe};
use voxeval::cli::{Cli, Commands, ConfigAction};
use voxeval::config::Config;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);
    tracing::debug!("voxeval {}", voxeval::version_string());

    if let Err(e) = run(cli) {
        eprintln!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::Listen {
        json: false,
        duration: None,
    });

    match command {
        Commands::Listen { json, duration } => {
            let config = load_config(cli.config.as_deref(), cli.model, cli.device)?;
            run_listen(config, json, cli.quiet, duration)?;
        }
        Commands::Transcribe { files, json } => {
            let config = load_config(cli.config.as_deref(), cli.model, cli.device)?;
            run_transcribe(&config, &files, json)?;
        }
        Commands::Devices => {
            list_audio_devices()?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = load_config(cli.config.as_deref(), cli.model, cli.device)?;
                print!("{}", config.to_toml()?);
            }
            ConfigAction::Path => {
                let path = cli.config.unwrap_or_else(Config::default_path);
                println!("{}", path.display());
            }
        },
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "voxeval", &mut std::io::stdout());
        }
    }
    Ok(())
}

/// Route `tracing` output to stderr.
///
/// Default shows warnings, `-v` debug, `-vv` per-frame trace, `-q` errors only.
fn init_logging(quiet: bool, verbosity: u8) {
    let level = match (quiet, verbosity) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::WARN,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Command-line flags (--model, --device)
/// 2. Environment variables (VOXEVAL_*)
/// 3. Custom config path from CLI (--config), else the default path
/// 4. Built-in defaults
fn load_config(
    custom_path: Option<&std::path::Path>,
    model: Option<std::path::PathBuf>,
    device: Option<String>,
) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    let config = apply_overrides(config.with_env_overrides(), model, device);
    config.validate()?;
    Ok(config)
}

/// List available audio input devices.
#[cfg(feature = "cpal-audio")]
fn list_audio_devices() -> Result<()> {
    let devices = voxeval::audio::capture::list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn list_audio_devices() -> Result<()> {
    Err(voxeval::VoxevalError::BackendUnavailable {
        component: "Audio capture",
        feature: "cpal-audio",
    }
    .into())
}
