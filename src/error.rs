//! Error types for holdtype
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.
//!
//! The split mirrors the fault taxonomy of the daemon: device faults are
//! recoverable via re-resolution, session faults (recorder, transcription,
//! injection) are swallowed per gesture, and everything that escapes to
//! `main` is a startup fault worth a non-zero exit.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the holdtype application
#[derive(Error, Debug)]
pub enum HoldtypeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("Injection error: {0}")]
    Inject(#[from] InjectError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to the raw input device
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Cannot open input device '{0}': {1}. Run as root, or adjust the device ACLs.")]
    Unavailable(String, String),

    #[error("Input device lost: {0}")]
    Lost(String),

    #[error("Unknown key name: '{0}'. Run 'holdtype detect' or evtest to find valid key names.")]
    UnknownKey(String),

    #[error("No input device reporting key {0} found under /dev/input")]
    NoMatchingDevice(String),
}

/// Errors related to the audio capture subprocess
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Failed to spawn '{binary}': {reason}. Install alsa-utils or set [recorder] binary.")]
    SpawnFailed { binary: String, reason: String },

    #[error("Recorder exited abnormally (status {status}) and left no usable audio at {path}")]
    ExitedAbnormally { status: i32, path: PathBuf },

    #[error("Configured user '{0}' does not exist")]
    UnknownUser(String),

    #[error("IO error while recording: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to speech-to-text transcription
#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Whisper initialization failed: {0}")]
    InitFailed(String),

    #[error("Accelerated compute device requested but this build carries no GPU backend.\n  Rebuild with --features gpu-vulkan (or gpu-cuda/gpu-hipblas), or set [whisper] device = \"auto\".")]
    AcceleratorUnavailable,

    #[error("Transcription failed: {0}")]
    InferenceFailed(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Transcription exceeded {0}s timeout")]
    Timeout(u64),
}

/// Errors related to text injection
#[derive(Error, Debug)]
pub enum InjectError {
    #[error("'{0}' not found in PATH. Install the ydotool package.")]
    InjectorMissing(String),

    #[error("Injector socket missing: {0}.\n  Ensure ydotoold.service is running and created the socket.")]
    SocketMissing(PathBuf),

    #[error("Text injection failed: {0}")]
    InjectionFailed(String),
}

/// Result type alias using HoldtypeError
pub type Result<T> = std::result::Result<T, HoldtypeError>;
