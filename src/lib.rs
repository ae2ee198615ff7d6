//! Holdtype: hold-to-talk dictation for Wayland
//!
//! A privileged daemon that provides hands-free dictation:
//! - Watches one raw input device for a hold-to-talk key (evdev)
//! - Captures microphone audio for the duration of the press, via an
//!   arecord subprocess running as the unprivileged desktop user
//! - Transcribes the capture with whisper.cpp (whisper-rs), locally
//! - Types the recognised text into the focused window through ydotoold
//!
//! # Architecture
//!
//! ```text
//!   /dev/input/eventN          hold key edges
//!  ┌───────────────┐  Pressed/Released  ┌───────────────────────────┐
//!  │ Device Reader │ ─────────────────▶ │         Daemon            │
//!  │    (evdev)    │                    │  Idle → Recording →       │
//!  └───────────────┘                    │  Transcribing → Injecting │
//!                                       └───────────┬───────────────┘
//!                      press: spawn                 │
//!               ┌───────────────────────────────────┤
//!               ▼                                   │ release: stop
//!  ┌─────────────────────────┐   WAV artifact       ▼
//!  │ Recorder (arecord, uid  │ ───────────▶ ┌──────────────┐
//!  │ dropped to target user) │              │   Whisper    │
//!  └─────────────────────────┘              │ (whisper-rs) │
//!                                           └──────┬───────┘
//!                                                  │ segments
//!                                                  ▼
//!                                           ┌──────────────┐
//!                                           │   Injector   │
//!                                           │  (ydotool)   │
//!                                           └──────────────┘
//! ```
//!
//! The daemon runs as root for /dev/input access; everything it spawns on
//! the user's behalf drops privileges first.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod device;
pub mod error;
pub mod inject;
pub mod recorder;
pub mod state;
pub mod transcribe;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{HoldtypeError, Result};
