//! State-machine tests for the daemon loop, driven with in-memory fakes
//!
//! No subprocesses, no whisper model, no ydotool socket: the fakes simulate
//! every recorder/transcriber/injector outcome so the transition rules can
//! be asserted deterministically.

use async_trait::async_trait;
use holdtype::config::Config;
use holdtype::daemon::{Daemon, DriveOutcome};
use holdtype::device::KeyEvent;
use holdtype::error::{InjectError, RecorderError, TranscribeError};
use holdtype::inject::TextInjector;
use holdtype::recorder::{AudioArtifact, AudioRecorder, RecorderFactory, StopOutcome};
use holdtype::transcribe::{Transcriber, TranscriptSegment};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Shared counters the fakes report into
#[derive(Default)]
struct Probe {
    recorders_built: AtomicUsize,
    sessions_started: AtomicUsize,
    stops: AtomicUsize,
    aborts: AtomicUsize,
    transcribe_calls: AtomicUsize,
    injected: Mutex<Vec<String>>,
}

impl Probe {
    fn count(&self, counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn injected(&self) -> Vec<String> {
        self.injected.lock().unwrap().clone()
    }
}

#[derive(Clone, Copy)]
enum RecorderMode {
    /// Clean exit with a usable artifact
    Clean,
    /// Non-zero exit but the file was salvageable
    Salvaged,
    /// The capture binary cannot be launched
    SpawnFail,
}

struct FakeRecorder {
    probe: Arc<Probe>,
    mode: RecorderMode,
    artifact: PathBuf,
}

#[async_trait]
impl AudioRecorder for FakeRecorder {
    async fn start(&mut self) -> Result<(), RecorderError> {
        match self.mode {
            RecorderMode::SpawnFail => Err(RecorderError::SpawnFailed {
                binary: "fake-arecord".to_string(),
                reason: "not found".to_string(),
            }),
            _ => {
                self.probe.sessions_started.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    async fn stop(&mut self) -> Result<StopOutcome, RecorderError> {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            RecorderMode::Clean => Ok(StopOutcome::Clean(AudioArtifact {
                path: self.artifact.clone(),
            })),
            RecorderMode::Salvaged => Ok(StopOutcome::Salvaged {
                artifact: AudioArtifact {
                    path: self.artifact.clone(),
                },
                status: 1,
            }),
            RecorderMode::SpawnFail => Ok(StopOutcome::NotRecording),
        }
    }

    async fn abort(&mut self) {
        self.probe.aborts.fetch_add(1, Ordering::SeqCst);
    }
}

enum TranscriberMode {
    Segments(Vec<&'static str>),
    /// Whitespace-only recognition: zero segments, not an error
    Empty,
    /// Simulates a hung backend; sleeps on the blocking thread
    Slow(Duration),
    Fail,
}

struct FakeTranscriber {
    probe: Arc<Probe>,
    mode: TranscriberMode,
}

impl Transcriber for FakeTranscriber {
    fn transcribe(
        &self,
        _artifact: &AudioArtifact,
    ) -> Result<Vec<TranscriptSegment>, TranscribeError> {
        self.probe.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            TranscriberMode::Segments(texts) => Ok(texts
                .iter()
                .map(|t| TranscriptSegment {
                    text: t.to_string(),
                })
                .collect()),
            TranscriberMode::Empty => Ok(vec![]),
            TranscriberMode::Slow(duration) => {
                std::thread::sleep(*duration);
                Ok(vec![TranscriptSegment {
                    text: "too late".to_string(),
                }])
            }
            TranscriberMode::Fail => Err(TranscribeError::InferenceFailed(
                "corrupt audio".to_string(),
            )),
        }
    }
}

struct FakeInjector {
    probe: Arc<Probe>,
    fail_first: bool,
}

#[async_trait]
impl TextInjector for FakeInjector {
    async fn inject(&self, text: &str) -> Result<(), InjectError> {
        let mut injected = self.probe.injected.lock().unwrap();
        let first = injected.is_empty();
        injected.push(text.to_string());
        if self.fail_first && first {
            return Err(InjectError::InjectionFailed("uinput rejected".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

fn test_config(audio_file: PathBuf) -> Config {
    let mut config = Config::default();
    config.target_user = "tester".to_string();
    config.recorder.audio_file = audio_file;
    config.whisper.timeout_secs = 5;
    config
}

fn build_daemon(
    probe: &Arc<Probe>,
    recorder_mode: RecorderMode,
    transcriber_mode: TranscriberMode,
    fail_first_injection: bool,
) -> (Daemon, PathBuf) {
    build_daemon_with_timeout(probe, recorder_mode, transcriber_mode, fail_first_injection, 5)
}

fn build_daemon_with_timeout(
    probe: &Arc<Probe>,
    recorder_mode: RecorderMode,
    transcriber_mode: TranscriberMode,
    fail_first_injection: bool,
    timeout_secs: u64,
) -> (Daemon, PathBuf) {
    let dir = tempfile::tempdir().unwrap().keep();
    let audio_file = dir.join("capture.wav");

    let mut config = test_config(audio_file.clone());
    config.whisper.timeout_secs = timeout_secs;

    let factory_probe = probe.clone();
    let factory_artifact = audio_file.clone();
    let factory: RecorderFactory = Box::new(move || {
        factory_probe.recorders_built.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeRecorder {
            probe: factory_probe.clone(),
            mode: recorder_mode,
            artifact: factory_artifact.clone(),
        })
    });

    let daemon = Daemon::new(
        config,
        Arc::new(FakeTranscriber {
            probe: probe.clone(),
            mode: transcriber_mode,
        }),
        Box::new(FakeInjector {
            probe: probe.clone(),
            fail_first: fail_first_injection,
        }),
        factory,
    );

    (daemon, audio_file)
}

/// Send a fixed event sequence, close the channel, run the loop to the end.
async fn drive_sequence(daemon: &mut Daemon, events: &[KeyEvent]) -> DriveOutcome {
    let (tx, rx) = mpsc::channel(32);
    let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

    for &event in events {
        tx.send(event).await.unwrap();
    }
    drop(tx);

    daemon.drive(rx, &mut shutdown_rx).await
}

#[tokio::test]
async fn end_to_end_gesture_injects_once() {
    let probe = Arc::new(Probe::default());
    let (mut daemon, _) = build_daemon(
        &probe,
        RecorderMode::Clean,
        TranscriberMode::Segments(vec!["turn on the lights"]),
        false,
    );

    let outcome =
        drive_sequence(&mut daemon, &[KeyEvent::Pressed, KeyEvent::Released]).await;

    assert_eq!(outcome, DriveOutcome::DeviceLost);
    assert_eq!(probe.count(&probe.sessions_started), 1);
    assert_eq!(probe.count(&probe.stops), 1);
    assert_eq!(probe.count(&probe.transcribe_calls), 1);
    assert_eq!(probe.injected(), vec!["turn on the lights"]);
}

#[tokio::test]
async fn repeated_press_starts_one_session() {
    let probe = Arc::new(Probe::default());
    let (mut daemon, _) = build_daemon(
        &probe,
        RecorderMode::Clean,
        TranscriberMode::Segments(vec!["hello"]),
        false,
    );

    drive_sequence(
        &mut daemon,
        &[
            KeyEvent::Pressed,
            KeyEvent::Pressed,
            KeyEvent::Pressed,
            KeyEvent::Released,
        ],
    )
    .await;

    assert_eq!(probe.count(&probe.sessions_started), 1);
    assert_eq!(probe.count(&probe.transcribe_calls), 1);
}

#[tokio::test]
async fn release_without_session_is_noop() {
    let probe = Arc::new(Probe::default());
    let (mut daemon, _) = build_daemon(
        &probe,
        RecorderMode::Clean,
        TranscriberMode::Segments(vec!["hello"]),
        false,
    );

    drive_sequence(&mut daemon, &[KeyEvent::Released]).await;

    assert_eq!(probe.count(&probe.recorders_built), 0);
    assert_eq!(probe.count(&probe.stops), 0);
    assert_eq!(probe.count(&probe.transcribe_calls), 0);
}

#[tokio::test]
async fn empty_transcript_skips_injection_and_recovers() {
    let probe = Arc::new(Probe::default());
    let (mut daemon, _) =
        build_daemon(&probe, RecorderMode::Clean, TranscriberMode::Empty, false);

    // Two full gestures: the second proves the machine returned to idle
    drive_sequence(
        &mut daemon,
        &[
            KeyEvent::Pressed,
            KeyEvent::Released,
            KeyEvent::Pressed,
            KeyEvent::Released,
        ],
    )
    .await;

    assert_eq!(probe.count(&probe.sessions_started), 2);
    assert_eq!(probe.count(&probe.transcribe_calls), 2);
    assert!(probe.injected().is_empty());
}

#[tokio::test]
async fn salvaged_artifact_still_reaches_transcription() {
    let probe = Arc::new(Probe::default());
    let (mut daemon, _) = build_daemon(
        &probe,
        RecorderMode::Salvaged,
        TranscriberMode::Segments(vec!["partial capture"]),
        false,
    );

    drive_sequence(&mut daemon, &[KeyEvent::Pressed, KeyEvent::Released]).await;

    assert_eq!(probe.count(&probe.transcribe_calls), 1);
    assert_eq!(probe.injected(), vec!["partial capture"]);
}

#[tokio::test]
async fn injection_failure_does_not_abort_remaining_segments() {
    let probe = Arc::new(Probe::default());
    let (mut daemon, _) = build_daemon(
        &probe,
        RecorderMode::Clean,
        TranscriberMode::Segments(vec!["first", "second"]),
        true,
    );

    drive_sequence(&mut daemon, &[KeyEvent::Pressed, KeyEvent::Released]).await;

    // First delivery failed, second was still attempted
    assert_eq!(probe.injected(), vec!["first", "second"]);
}

#[tokio::test]
async fn spawn_failure_returns_to_idle_and_stays_up() {
    let probe = Arc::new(Probe::default());
    let (mut daemon, _) = build_daemon(
        &probe,
        RecorderMode::SpawnFail,
        TranscriberMode::Segments(vec!["never"]),
        false,
    );

    drive_sequence(
        &mut daemon,
        &[
            KeyEvent::Pressed,
            KeyEvent::Released,
            KeyEvent::Pressed,
            KeyEvent::Released,
        ],
    )
    .await;

    // Each press attempted a fresh recorder; none got a session going
    assert_eq!(probe.count(&probe.recorders_built), 2);
    assert_eq!(probe.count(&probe.sessions_started), 0);
    assert_eq!(probe.count(&probe.transcribe_calls), 0);
}

#[tokio::test]
async fn transcription_failure_recovers_to_idle() {
    let probe = Arc::new(Probe::default());
    let (mut daemon, _) =
        build_daemon(&probe, RecorderMode::Clean, TranscriberMode::Fail, false);

    drive_sequence(
        &mut daemon,
        &[
            KeyEvent::Pressed,
            KeyEvent::Released,
            KeyEvent::Pressed,
            KeyEvent::Released,
        ],
    )
    .await;

    assert_eq!(probe.count(&probe.transcribe_calls), 2);
    assert!(probe.injected().is_empty());
}

#[tokio::test]
async fn transcription_timeout_is_a_session_fault() {
    let probe = Arc::new(Probe::default());
    let (mut daemon, _) = build_daemon_with_timeout(
        &probe,
        RecorderMode::Clean,
        TranscriberMode::Slow(Duration::from_secs(2)),
        false,
        1,
    );

    drive_sequence(&mut daemon, &[KeyEvent::Pressed, KeyEvent::Released]).await;

    // The hung backend's result is discarded; nothing reaches the injector
    assert_eq!(probe.count(&probe.transcribe_calls), 1);
    assert!(probe.injected().is_empty());
}

#[tokio::test]
async fn shutdown_mid_recording_reaps_subprocess_and_removes_artifact() {
    let probe = Arc::new(Probe::default());
    let (daemon, audio_file) = build_daemon(
        &probe,
        RecorderMode::Clean,
        TranscriberMode::Segments(vec!["never delivered"]),
        false,
    );
    std::fs::write(&audio_file, b"partial").unwrap();

    let (tx, rx) = mpsc::channel(32);
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let mut daemon = daemon;
    let handle = tokio::spawn(async move { daemon.drive(rx, &mut shutdown_rx).await });

    tx.send(KeyEvent::Pressed).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(true).unwrap();

    let outcome = handle.await.unwrap();
    assert_eq!(outcome, DriveOutcome::Shutdown);
    assert_eq!(probe.count(&probe.aborts), 1);
    // Partial capture never reaches transcription or injection
    assert_eq!(probe.count(&probe.transcribe_calls), 0);
    assert!(probe.injected().is_empty());
    assert!(!audio_file.exists());
}

#[tokio::test]
async fn device_loss_mid_recording_tears_down_session() {
    let probe = Arc::new(Probe::default());
    let (daemon, _) = build_daemon(
        &probe,
        RecorderMode::Clean,
        TranscriberMode::Segments(vec!["never delivered"]),
        false,
    );

    let (tx, rx) = mpsc::channel(32);
    let (_shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let mut daemon = daemon;
    let handle = tokio::spawn(async move { daemon.drive(rx, &mut shutdown_rx).await });

    tx.send(KeyEvent::Pressed).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(tx);

    let outcome = handle.await.unwrap();
    assert_eq!(outcome, DriveOutcome::DeviceLost);
    assert_eq!(probe.count(&probe.aborts), 1);
    assert_eq!(probe.count(&probe.transcribe_calls), 0);
}
