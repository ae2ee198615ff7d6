//! Audio capture module
//!
//! Exactly one capture subprocess exists per hold gesture: spawned on key
//! press, stopped on release. The subprocess runs under the unprivileged
//! desktop user so PipeWire/PulseAudio session routing applies, while the
//! daemon itself stays root for /dev/input access.
//!
//! The trait seam exists so the daemon loop can be driven by an in-memory
//! fake in tests; only `arecord::SubprocessRecorder` talks to a real binary.

pub mod arecord;

use crate::error::RecorderError;
use async_trait::async_trait;
use std::path::PathBuf;

/// Capture sample format handed to the capture binary. Whisper consumes
/// 16-bit signed little-endian PCM; this is not configurable.
pub const SAMPLE_FORMAT: &str = "S16_LE";

/// A finished recording handed off to transcription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    /// WAV file on disk (mono, 16 kHz, S16_LE by configuration)
    pub path: PathBuf,
}

/// Result of stopping a recorder
#[derive(Debug)]
pub enum StopOutcome {
    /// Subprocess exited cleanly and left a usable file
    Clean(AudioArtifact),
    /// Subprocess exited with a non-zero status but the file is non-empty;
    /// partial captures are often still transcribable
    Salvaged { artifact: AudioArtifact, status: i32 },
    /// Nothing was running: stop before start, or a second stop
    NotRecording,
}

impl StopOutcome {
    /// The artifact, if this outcome produced one
    pub fn into_artifact(self) -> Option<AudioArtifact> {
        match self {
            StopOutcome::Clean(artifact) => Some(artifact),
            StopOutcome::Salvaged { artifact, .. } => Some(artifact),
            StopOutcome::NotRecording => None,
        }
    }
}

/// Trait for audio capture implementations
#[async_trait]
pub trait AudioRecorder: Send {
    /// Spawn the capture subprocess
    async fn start(&mut self) -> Result<(), RecorderError>;

    /// Stop the subprocess gracefully and collect the artifact.
    /// Stopping an idle recorder is a no-op, not an error.
    async fn stop(&mut self) -> Result<StopOutcome, RecorderError>;

    /// Kill the subprocess and reap it without producing an artifact.
    /// Used on shutdown and on teardown after a mid-gesture fault.
    async fn abort(&mut self);
}

/// Factory producing one fresh recorder per gesture
pub type RecorderFactory = Box<dyn Fn() -> Box<dyn AudioRecorder> + Send + Sync>;
