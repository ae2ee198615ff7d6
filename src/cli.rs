// Command-line interface definitions for holdtype
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "holdtype")]
#[command(author, version, about = "Hold-to-talk dictation daemon for Wayland")]
#[command(long_about = "
Holdtype is a hold-to-talk dictation daemon for Wayland Linux systems.
Hold a key to record, release to transcribe; the recognised text is typed
into the focused window.

SETUP:
  1. Install alsa-utils (arecord) and ydotool
  2. Enable the ydotool daemon for your user:
       systemctl --user enable --now ydotoold
  3. Place a whisper model under /var/lib/holdtype/models
  4. Edit /etc/holdtype/config.toml (holdtype config --default > ...)
  5. Enable the service: systemctl enable --now holdtype

USAGE:
  Hold Right Ctrl (default) while speaking, release to transcribe.
  The daemon must run as root to read /dev/input.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Override the target desktop user
    #[arg(long, value_name = "USER")]
    pub user: Option<String>,

    /// Override the trigger key (e.g., RIGHTCTRL, SCROLLLOCK, F13)
    #[arg(long, value_name = "KEY")]
    pub key: Option<String>,

    /// Override the input device path (or "auto")
    #[arg(long, value_name = "PATH")]
    pub device: Option<String>,

    /// Override the whisper model (tiny, base, small, medium, large-v3)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Transcribe an audio file through the configured backend
    Transcribe {
        /// Path to a WAV file
        file: std::path::PathBuf,
    },

    /// Scan /dev/input and report devices carrying the trigger key
    Detect,

    /// Show current configuration
    Config {
        /// Print the commented default config template instead
        #[arg(long)]
        default: bool,
    },
}
