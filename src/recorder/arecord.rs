//! arecord-based capture subprocess
//!
//! Spawns the configured capture binary (arecord by default) with explicit
//! format flags and the session output path, with uid/gid dropped to the
//! target user and that user's session environment exported. ALSA/PipeWire
//! find the user's default source through XDG_RUNTIME_DIR, which is why the
//! environment matters as much as the uid.
//!
//! Stopping sends SIGTERM so arecord flushes the WAV header, waits a
//! bounded grace period, then falls back to SIGKILL.

use super::{AudioArtifact, AudioRecorder, RecorderFactory, StopOutcome, SAMPLE_FORMAT};
use crate::config::{Config, RecorderConfig};
use crate::error::RecorderError;
use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::{Pid, User};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Everything needed to spawn one capture subprocess, resolved once at
/// startup so per-gesture start is just a spawn.
struct CaptureSpec {
    binary: String,
    audio_file: PathBuf,
    sample_rate: u32,
    channels: u16,
    stop_timeout: Duration,
    uid: u32,
    gid: u32,
    env: Vec<(String, String)>,
}

/// Recorder that shells out to an arecord-compatible binary
pub struct SubprocessRecorder {
    spec: Arc<CaptureSpec>,
    child: Option<Child>,
}

/// Look up the target desktop user. A missing user is a startup fault,
/// not something to discover mid-gesture.
pub fn resolve_user(name: &str) -> Result<User, RecorderError> {
    User::from_name(name)
        .map_err(|e| RecorderError::Io(std::io::Error::other(e)))?
        .ok_or_else(|| RecorderError::UnknownUser(name.to_string()))
}

/// Build a factory producing one recorder per gesture. The session
/// environment is resolved once so per-gesture start is just a spawn.
pub fn create_factory(config: &Config, user: &User) -> Result<RecorderFactory, RecorderError> {
    let runtime_dir = PathBuf::from(format!("/run/user/{}", user.uid.as_raw()));
    let env = session_env(
        &user.dir,
        &runtime_dir,
        &config.recorder.display,
        config.recorder.wayland_display.as_deref(),
    );

    tracing::debug!(
        "Capture subprocess will run as {} (uid {}) with runtime dir {}",
        config.target_user,
        user.uid,
        runtime_dir.display()
    );

    let spec = Arc::new(CaptureSpec {
        binary: config.recorder.binary.clone(),
        audio_file: config.recorder.audio_file.clone(),
        sample_rate: config.recorder.sample_rate,
        channels: config.recorder.channels,
        stop_timeout: Duration::from_millis(config.recorder.stop_timeout_ms),
        uid: user.uid.as_raw(),
        gid: user.gid.as_raw(),
        env,
    });

    Ok(Box::new(move || {
        Box::new(SubprocessRecorder {
            spec: spec.clone(),
            child: None,
        })
    }))
}

#[async_trait]
impl AudioRecorder for SubprocessRecorder {
    async fn start(&mut self) -> Result<(), RecorderError> {
        if self.child.is_some() {
            // The daemon's state machine never double-starts; guard anyway.
            return Ok(());
        }

        let spec = &self.spec;
        let mut cmd = Command::new(&spec.binary);
        cmd.args(capture_args(
            spec.sample_rate,
            spec.channels,
            &spec.audio_file,
        ));
        cmd.env_clear();
        cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd.uid(spec.uid);
        cmd.gid(spec.gid);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        let child = cmd.spawn().map_err(|e| RecorderError::SpawnFailed {
            binary: spec.binary.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            "Recording started (pid {}) -> {}",
            child.id().unwrap_or(0),
            spec.audio_file.display()
        );
        self.child = Some(child);
        Ok(())
    }

    async fn stop(&mut self) -> Result<StopOutcome, RecorderError> {
        let Some(mut child) = self.child.take() else {
            return Ok(StopOutcome::NotRecording);
        };

        terminate(&child);

        let status = match tokio::time::timeout(self.spec.stop_timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                tracing::warn!(
                    "Recorder ignored SIGTERM for {:?}, force-killing",
                    self.spec.stop_timeout
                );
                child.start_kill()?;
                child.wait().await?
            }
        };

        // Exit-by-signal is the expected result of our own SIGTERM.
        collect_artifact(status.code(), &self.spec.audio_file)
    }

    async fn abort(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        terminate(&child);

        if tokio::time::timeout(self.spec.stop_timeout, child.wait())
            .await
            .is_err()
        {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        tracing::debug!("Recorder subprocess reaped on abort");
    }
}

/// Send SIGTERM to a live child. Failures are logged, not fatal: the
/// bounded wait plus SIGKILL fallback covers a missed signal.
fn terminate(child: &Child) {
    if let Some(pid) = child.id() {
        if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            tracing::warn!("SIGTERM to recorder pid {} failed: {}", pid, e);
        }
    }
}

/// Arguments for the capture binary: explicit format, rate, channels, path.
fn capture_args(sample_rate: u32, channels: u16, audio_file: &Path) -> Vec<String> {
    vec![
        "-f".to_string(),
        SAMPLE_FORMAT.to_string(),
        "-r".to_string(),
        sample_rate.to_string(),
        "-c".to_string(),
        channels.to_string(),
        audio_file.display().to_string(),
    ]
}

/// Decide what a finished subprocess left behind.
fn collect_artifact(
    exit_code: Option<i32>,
    audio_file: &Path,
) -> Result<StopOutcome, RecorderError> {
    let usable = std::fs::metadata(audio_file)
        .map(|m| m.len() > 0)
        .unwrap_or(false);

    match exit_code {
        // None = terminated by signal, i.e. our own SIGTERM
        None | Some(0) => {
            if usable {
                Ok(StopOutcome::Clean(AudioArtifact {
                    path: audio_file.to_path_buf(),
                }))
            } else {
                Err(RecorderError::ExitedAbnormally {
                    status: exit_code.unwrap_or(0),
                    path: audio_file.to_path_buf(),
                })
            }
        }
        Some(status) => {
            if usable {
                Ok(StopOutcome::Salvaged {
                    artifact: AudioArtifact {
                        path: audio_file.to_path_buf(),
                    },
                    status,
                })
            } else {
                Err(RecorderError::ExitedAbnormally {
                    status,
                    path: audio_file.to_path_buf(),
                })
            }
        }
    }
}

/// Environment for the capture subprocess: the target user's session, not
/// the daemon's root environment.
fn session_env(
    home: &Path,
    runtime_dir: &Path,
    display: &str,
    wayland_display: Option<&str>,
) -> Vec<(String, String)> {
    let wayland = match wayland_display {
        Some(w) => w.to_string(),
        None => discover_wayland_display(runtime_dir),
    };

    vec![
        ("HOME".to_string(), home.display().to_string()),
        (
            "XDG_CACHE_HOME".to_string(),
            home.join(".cache").display().to_string(),
        ),
        (
            "XDG_RUNTIME_DIR".to_string(),
            runtime_dir.display().to_string(),
        ),
        ("DISPLAY".to_string(), display.to_string()),
        ("WAYLAND_DISPLAY".to_string(), wayland),
    ]
}

/// Pick the compositor socket name from the runtime dir, first match wins.
fn discover_wayland_display(runtime_dir: &Path) -> String {
    let mut candidates: Vec<String> = std::fs::read_dir(runtime_dir)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.starts_with("wayland-") && !n.ends_with(".lock"))
        .collect();
    candidates.sort();

    match candidates.into_iter().next() {
        Some(name) => {
            tracing::debug!("Auto-detected Wayland display: {}", name);
            name
        }
        None => {
            tracing::warn!(
                "No Wayland display under {}, assuming wayland-0",
                runtime_dir.display()
            );
            "wayland-0".to_string()
        }
    }
}

/// Preflight check used at daemon startup: the capture binary must exist
/// before the first gesture, not fail during it.
pub fn check_binary(config: &RecorderConfig) -> Result<PathBuf, RecorderError> {
    which::which(&config.binary).map_err(|e| RecorderError::SpawnFailed {
        binary: config.binary.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_capture_args() {
        let args = capture_args(16000, 1, Path::new("/tmp/holdtype.wav"));
        assert_eq!(
            args,
            vec!["-f", "S16_LE", "-r", "16000", "-c", "1", "/tmp/holdtype.wav"]
        );
    }

    #[test]
    fn test_collect_artifact_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"RIFF....")
            .unwrap();

        match collect_artifact(None, &path).unwrap() {
            StopOutcome::Clean(artifact) => assert_eq!(artifact.path, path),
            other => panic!("expected Clean, got {:?}", other),
        }
    }

    #[test]
    fn test_collect_artifact_salvages_partial_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"RIFF....")
            .unwrap();

        // Non-zero exit with a non-empty file: still handed to transcription
        match collect_artifact(Some(1), &path).unwrap() {
            StopOutcome::Salvaged { artifact, status } => {
                assert_eq!(artifact.path, path);
                assert_eq!(status, 1);
            }
            other => panic!("expected Salvaged, got {:?}", other),
        }
    }

    #[test]
    fn test_collect_artifact_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        std::fs::File::create(&path).unwrap();

        assert!(matches!(
            collect_artifact(Some(1), &path),
            Err(RecorderError::ExitedAbnormally { status: 1, .. })
        ));
    }

    #[test]
    fn test_collect_artifact_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-written.wav");

        assert!(collect_artifact(None, &path).is_err());
    }

    #[test]
    fn test_discover_wayland_display() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("wayland-1")).unwrap();
        std::fs::File::create(dir.path().join("wayland-1.lock")).unwrap();
        std::fs::File::create(dir.path().join("pipewire-0")).unwrap();

        assert_eq!(discover_wayland_display(dir.path()), "wayland-1");
    }

    #[test]
    fn test_discover_wayland_display_fallback() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(discover_wayland_display(dir.path()), "wayland-0");
    }

    #[test]
    fn test_session_env_prefers_override() {
        let env = session_env(
            Path::new("/home/micha"),
            Path::new("/run/user/1000"),
            ":0",
            Some("wayland-7"),
        );
        let wayland = env
            .iter()
            .find(|(k, _)| k == "WAYLAND_DISPLAY")
            .map(|(_, v)| v.as_str());
        assert_eq!(wayland, Some("wayland-7"));

        let runtime = env
            .iter()
            .find(|(k, _)| k == "XDG_RUNTIME_DIR")
            .map(|(_, v)| v.as_str());
        assert_eq!(runtime, Some("/run/user/1000"));
    }
}
