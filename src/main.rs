//! Holdtype - hold-to-talk dictation daemon for Wayland
//!
//! Run with `holdtype` or `holdtype daemon` to start the daemon (as root).
//! Use `holdtype detect` to find your keyboard device.
//! Use `holdtype transcribe <file>` to transcribe an audio file.

use anyhow::Context;
use clap::Parser;
use holdtype::cli::{Cli, Commands};
use holdtype::{config, daemon, device, recorder, transcribe};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("holdtype={},warn", log_level))),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(user) = cli.user {
        config.target_user = user;
    }
    if let Some(key) = cli.key {
        config.device.key = key;
    }
    if let Some(device) = cli.device {
        config.device.path = device;
    }
    if let Some(model) = cli.model {
        config.whisper.model = model;
    }

    // Run the appropriate command
    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            if !nix::unistd::geteuid().is_root() {
                anyhow::bail!(
                    "the daemon must run as root to read /dev/input (use systemd or sudo)"
                );
            }
            let mut daemon = daemon::Daemon::from_config(config)?;
            daemon.run().await?;
        }

        Commands::Transcribe { file } => {
            transcribe_file(&config, file)?;
        }

        Commands::Detect => {
            run_detect(&config)?;
        }

        Commands::Config { default } => {
            show_config(&config, default)?;
        }
    }

    Ok(())
}

/// One-shot transcription of a WAV file, printed segment per line
fn transcribe_file(config: &config::Config, path: std::path::PathBuf) -> anyhow::Result<()> {
    let transcriber = transcribe::create_transcriber(&config.whisper)?;
    let artifact = recorder::AudioArtifact { path };

    let segments = transcriber
        .transcribe(&artifact)
        .context("transcription failed")?;

    if segments.is_empty() {
        eprintln!("(nothing recognised)");
    } else {
        for segment in &segments {
            println!("{}", segment.text);
        }
    }

    Ok(())
}

/// List input devices and whether they carry the trigger key
fn run_detect(config: &config::Config) -> anyhow::Result<()> {
    let key = device::parse_key_name(&config.device.key)?;

    println!("Scanning /dev/input for {:?}...", key);
    let devices = device::resolve::scan(key);

    if devices.is_empty() {
        anyhow::bail!("no input devices readable; run as root");
    }

    for d in &devices {
        let marker = if d.has_key {
            "  [has trigger key]"
        } else if d.keyboard_like {
            "  [keyboard-like]"
        } else {
            ""
        };
        println!("{}  {}{}", d.path.display(), d.name, marker);
    }

    match devices.iter().find(|d| d.has_key) {
        Some(d) => println!("\nRecommended: {}", d.path.display()),
        None => println!("\nNo device reports {:?}; check the key name.", key),
    }

    Ok(())
}

/// Print the effective configuration, or the commented template
fn show_config(config: &config::Config, default: bool) -> anyhow::Result<()> {
    if default {
        print!("{}", config::DEFAULT_CONFIG);
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}
