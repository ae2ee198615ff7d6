//! Daemon module - hold-to-talk orchestration
//!
//! Consumes key edges from the device reader and drives the recorder,
//! transcriber, and injector through one gesture at a time. Faults local to
//! a gesture are logged and swallowed; the loop only ends on shutdown or
//! when the input device cannot be recovered.
//!
//! Components arrive as trait objects (plus a factory for the per-gesture
//! recorder), so the whole state machine runs against in-memory fakes in
//! the integration tests.

use crate::config::Config;
use crate::device::{self, resolve, DeviceReader, KeyEvent};
use crate::error::{HoldtypeError, Result, TranscribeError};
use crate::inject::{self, TextInjector};
use crate::recorder::{self, AudioArtifact, AudioRecorder, RecorderFactory, StopOutcome};
use crate::state::State;
use crate::transcribe::{self, Transcriber, TranscriptSegment};
use evdev::Key;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch};

/// Why one event stream ended
#[derive(Debug, PartialEq, Eq)]
pub enum DriveOutcome {
    /// Process shutdown requested; the daemon is done
    Shutdown,
    /// The event channel closed: device read error or unplug
    DeviceLost,
}

/// Main daemon that orchestrates all components
pub struct Daemon {
    config: Config,
    transcriber: Arc<dyn Transcriber>,
    injector: Box<dyn TextInjector>,
    recorder_factory: RecorderFactory,
}

impl Daemon {
    /// Assemble a daemon from pre-built components. Tests use this with
    /// fakes; production goes through [`Daemon::from_config`].
    pub fn new(
        config: Config,
        transcriber: Arc<dyn Transcriber>,
        injector: Box<dyn TextInjector>,
        recorder_factory: RecorderFactory,
    ) -> Self {
        Self {
            config,
            transcriber,
            injector,
            recorder_factory,
        }
    }

    /// Wire up production components. Everything that can fail here is a
    /// startup fault: missing user, missing binaries, missing model,
    /// accelerator forced but absent.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let user = recorder::arecord::resolve_user(&config.target_user)?;

        let capture_bin = recorder::arecord::check_binary(&config.recorder)?;
        tracing::debug!("Capture binary: {}", capture_bin.display());

        let injector = Box::new(inject::ydotool::YdotoolInjector::new(
            &config.inject,
            user.uid.as_raw(),
        )?);

        let recorder_factory = recorder::arecord::create_factory(&config, &user)?;

        // Load the model now, once; every gesture reuses it.
        let transcriber: Arc<dyn Transcriber> =
            Arc::from(transcribe::create_transcriber(&config.whisper)?);

        Ok(Self::new(config, transcriber, injector, recorder_factory))
    }

    /// Run the daemon until shutdown or an unrecoverable device fault.
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting holdtype daemon");

        let key = device::parse_key_name(&self.config.device.key)?;

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| HoldtypeError::Config(format!("Failed to set up SIGTERM handler: {}", e)))?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
                _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT, shutting down..."),
            }
            let _ = shutdown_tx.send(true);
        });

        let mut reader = self.open_device(key)?;
        tracing::info!(
            "Listening for {} on {} (hold to dictate)",
            self.config.device.key,
            reader.path().display()
        );

        loop {
            let (rx, mut handle) = reader.into_events();

            match self.drive(rx, &mut shutdown_rx).await {
                DriveOutcome::Shutdown => {
                    handle.stop();
                    break;
                }
                DriveOutcome::DeviceLost => {
                    handle.stop();
                    reader = self.reopen_device(key, &mut shutdown_rx).await?;
                    tracing::info!("Reopened input device {}", reader.path().display());
                }
            }
        }

        tracing::info!("Daemon stopped");
        Ok(())
    }

    /// Process events from one reader until shutdown or channel closure.
    ///
    /// Per-gesture faults never escape this loop; that is the contract that
    /// keeps one bad utterance from taking the daemon down.
    pub async fn drive(
        &mut self,
        mut rx: mpsc::Receiver<KeyEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> DriveOutcome {
        let mut state = State::Idle;
        let mut active: Option<Box<dyn AudioRecorder>> = None;

        if *shutdown.borrow() {
            return DriveOutcome::Shutdown;
        }

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(KeyEvent::Pressed) => self.on_press(&mut state, &mut active).await,
                    Some(KeyEvent::Released) => self.on_release(&mut state, &mut active).await,
                    None => {
                        tracing::warn!("Input device lost");
                        self.teardown(&mut state, &mut active).await;
                        return DriveOutcome::DeviceLost;
                    }
                },
                _ = shutdown.changed() => {
                    self.teardown(&mut state, &mut active).await;
                    return DriveOutcome::Shutdown;
                }
            }
        }
    }

    /// IDLE + press: start a capture session. Any other state ignores the
    /// press; the reader already filtered autorepeat, so this only fires on
    /// real edges.
    async fn on_press(&mut self, state: &mut State, active: &mut Option<Box<dyn AudioRecorder>>) {
        if !state.is_idle() {
            tracing::debug!("Press ignored in state {}", state);
            return;
        }

        let mut recorder = (self.recorder_factory)();
        match recorder.start().await {
            Ok(()) => {
                *active = Some(recorder);
                *state = State::Recording {
                    started_at: std::time::Instant::now(),
                };
            }
            Err(e) => {
                // The gesture is lost, not retried; the user presses again.
                tracing::error!("Failed to start recording: {}", e);
            }
        }
    }

    /// RECORDING + release: stop, transcribe, inject, return to idle.
    async fn on_release(&mut self, state: &mut State, active: &mut Option<Box<dyn AudioRecorder>>) {
        if !state.is_recording() {
            tracing::debug!("Release ignored in state {}", state);
            return;
        }

        let duration = state.recording_duration().unwrap_or_default();
        tracing::info!("Recording stopped ({:.1}s)", duration.as_secs_f32());

        let Some(mut recorder) = active.take() else {
            *state = State::Idle;
            return;
        };

        let artifact = match recorder.stop().await {
            Ok(StopOutcome::Clean(artifact)) => artifact,
            Ok(StopOutcome::Salvaged { artifact, status }) => {
                tracing::warn!(
                    "Recorder exited with status {} but left audio, transcribing anyway",
                    status
                );
                artifact
            }
            Ok(StopOutcome::NotRecording) => {
                *state = State::Idle;
                return;
            }
            Err(e) => {
                tracing::error!("Recording failed: {}", e);
                *state = State::Idle;
                return;
            }
        };

        *state = State::Transcribing;

        let segments = match self.run_transcription(artifact.clone()).await {
            Ok(segments) => segments,
            Err(e) => {
                tracing::error!("Transcription failed: {}", e);
                cleanup_artifact(&artifact.path);
                *state = State::Idle;
                return;
            }
        };
        cleanup_artifact(&artifact.path);

        if segments.is_empty() {
            tracing::info!("Nothing recognised");
            *state = State::Idle;
            return;
        }

        *state = State::Injecting {
            total: segments.len(),
        };

        for segment in &segments {
            tracing::info!("Recognised: {:?}", segment.text);
            if let Err(e) = self.injector.inject(&segment.text).await {
                // Best-effort delivery: later segments still get their shot.
                tracing::error!("Injection via {} failed: {}", self.injector.name(), e);
            }
        }

        *state = State::Idle;
    }

    /// Run the blocking whisper call off the event loop, bounded by the
    /// configured timeout. A timed-out inference keeps running on its
    /// blocking thread until whisper returns; its result is discarded.
    async fn run_transcription(
        &self,
        artifact: AudioArtifact,
    ) -> std::result::Result<Vec<TranscriptSegment>, TranscribeError> {
        let transcriber = self.transcriber.clone();
        let task = tokio::task::spawn_blocking(move || transcriber.transcribe(&artifact));

        let timeout_secs = self.config.whisper.timeout_secs;
        let joined = if timeout_secs > 0 {
            match tokio::time::timeout(Duration::from_secs(timeout_secs), task).await {
                Ok(joined) => joined,
                Err(_) => return Err(TranscribeError::Timeout(timeout_secs)),
            }
        } else {
            task.await
        };

        joined
            .map_err(|e| TranscribeError::InferenceFailed(format!("task panicked: {}", e)))?
    }

    /// Kill and reap any in-flight session. Called on shutdown and on
    /// device loss; the partial capture is discarded, never transcribed.
    async fn teardown(&mut self, state: &mut State, active: &mut Option<Box<dyn AudioRecorder>>) {
        if let Some(mut recorder) = active.take() {
            tracing::info!("Tearing down in-flight recording session");
            recorder.abort().await;
            cleanup_artifact(&self.config.recorder.audio_file);
        }
        *state = State::Idle;
    }

    /// Open the input device: configured path first, scan only on failure.
    fn open_device(&self, key: Key) -> Result<DeviceReader> {
        if self.config.device.path != "auto" {
            let path = Path::new(&self.config.device.path);
            match DeviceReader::open(path, key) {
                Ok(reader) => return Ok(reader),
                Err(e) => {
                    tracing::warn!("{}; scanning /dev/input instead", e);
                }
            }
        }

        let resolved = resolve::find_device_for_key(key)?;
        Ok(DeviceReader::open(&resolved, key)?)
    }

    /// Bounded re-resolution after a lost device: a few attempts with a
    /// growing delay, then give up and let the process exit non-zero.
    async fn reopen_device(
        &self,
        key: Key,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<DeviceReader> {
        let attempts = self.config.device.reopen_attempts.max(1);
        let base_delay = Duration::from_millis(self.config.device.reopen_delay_ms);

        for attempt in 1..=attempts {
            if *shutdown.borrow() {
                return Err(HoldtypeError::Device(crate::error::DeviceError::Lost(
                    "shutdown during device recovery".to_string(),
                )));
            }

            let delay = base_delay * attempt;
            tracing::info!(
                "Re-resolving input device in {:?} (attempt {}/{})",
                delay,
                attempt,
                attempts
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => continue,
            }

            match self.open_device(key) {
                Ok(reader) => return Ok(reader),
                Err(e) => tracing::warn!("Device recovery attempt {} failed: {}", attempt, e),
            }
        }

        Err(HoldtypeError::Device(crate::error::DeviceError::Lost(
            format!("device not recovered after {} attempts", attempts),
        )))
    }
}

/// Remove a session's audio file. Best effort; a leftover temp file is
/// overwritten by the next session anyway.
fn cleanup_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!("Could not remove {}: {}", path.display(), e),
    }
}
