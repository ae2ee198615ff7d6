//! evdev-based device reader
//!
//! Opens one input device node and turns its raw event stream into edge
//! events for a single key. The blocking read loop runs on a dedicated
//! blocking task; the daemon consumes events through an mpsc channel.
//!
//! The stream is infinite but not restartable: any read error closes the
//! channel, and the caller re-resolves and reopens the device. Kernel key
//! values are 1 = press, 0 = release, 2 = autorepeat; autorepeat never
//! reaches the channel.

use super::KeyEvent;
use crate::error::DeviceError;
use evdev::{Device, InputEventKind, Key};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// An opened input device, ready to produce key edges
pub struct DeviceReader {
    device: Device,
    path: PathBuf,
    key: Key,
}

/// Handle to stop a running reader loop
pub struct ReaderHandle {
    stop: Option<oneshot::Sender<()>>,
}

impl ReaderHandle {
    /// Ask the reader loop to exit. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl DeviceReader {
    /// Open a device node for reading key edges of `key`.
    ///
    /// Fails when the node does not exist or the daemon lacks permission;
    /// both are reported as `DeviceError::Unavailable`.
    pub fn open(path: &Path, key: Key) -> Result<Self, DeviceError> {
        let device = Device::open(path)
            .map_err(|e| DeviceError::Unavailable(path.display().to_string(), e.to_string()))?;

        tracing::info!(
            "Opened input device {} ({})",
            path.display(),
            device.name().unwrap_or("unknown")
        );

        Ok(Self {
            device,
            path: path.to_path_buf(),
            key,
        })
    }

    /// Device node this reader was opened on
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start the blocking read loop and return the event channel.
    ///
    /// The channel closes when the device errors out (lost) or the handle
    /// is stopped; the two are indistinguishable to the consumer, which is
    /// fine because the consumer only stops the reader on shutdown.
    pub fn into_events(self) -> (mpsc::Receiver<KeyEvent>, ReaderHandle) {
        let (tx, rx) = mpsc::channel(32);
        let (stop_tx, stop_rx) = oneshot::channel();

        tokio::task::spawn_blocking(move || {
            read_loop(self.device, self.path, self.key, tx, stop_rx);
        });

        (rx, ReaderHandle { stop: Some(stop_tx) })
    }
}

/// Blocking loop: poll the device, forward edges, exit on error or stop.
fn read_loop(
    mut device: Device,
    path: PathBuf,
    key: Key,
    tx: mpsc::Sender<KeyEvent>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    // Non-blocking mode so fetch_events returns instead of parking the
    // thread; the stop signal is checked between polls.
    let fd = device.as_raw_fd();
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags != -1 {
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }
    }

    let mut is_pressed = false;

    loop {
        match stop_rx.try_recv() {
            Ok(_) | Err(oneshot::error::TryRecvError::Closed) => {
                tracing::debug!("Device reader stopping");
                return;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
        }

        match device.fetch_events() {
            Ok(events) => {
                for event in events {
                    let InputEventKind::Key(code) = event.kind() else {
                        continue;
                    };
                    if code != key {
                        continue;
                    }

                    if let Some(edge) = key_edge(event.value(), &mut is_pressed) {
                        if tx.blocking_send(edge).is_err() {
                            return; // consumer gone
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => {
                // Device unplugged or renumbered; channel closure tells the
                // daemon to re-resolve.
                tracing::warn!("Read error on {}: {}", path.display(), e);
                return;
            }
        }

        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Map a raw kernel key value onto an edge, tracking held state.
///
/// 1 = press, 0 = release, 2 = autorepeat. Autorepeat and a release with no
/// matching press (key already held when the device was opened) produce
/// nothing.
fn key_edge(value: i32, is_pressed: &mut bool) -> Option<KeyEvent> {
    match value {
        1 if !*is_pressed => {
            *is_pressed = true;
            Some(KeyEvent::Pressed)
        }
        0 if *is_pressed => {
            *is_pressed = false;
            Some(KeyEvent::Released)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_edge_press_release() {
        let mut held = false;
        assert_eq!(key_edge(1, &mut held), Some(KeyEvent::Pressed));
        assert_eq!(key_edge(0, &mut held), Some(KeyEvent::Released));
    }

    #[test]
    fn test_key_edge_filters_autorepeat() {
        let mut held = false;
        assert_eq!(key_edge(1, &mut held), Some(KeyEvent::Pressed));
        assert_eq!(key_edge(2, &mut held), None);
        assert_eq!(key_edge(2, &mut held), None);
        assert_eq!(key_edge(0, &mut held), Some(KeyEvent::Released));
    }

    #[test]
    fn test_key_edge_dedups_repeated_press_values() {
        let mut held = false;
        assert_eq!(key_edge(1, &mut held), Some(KeyEvent::Pressed));
        assert_eq!(key_edge(1, &mut held), None);
        assert_eq!(key_edge(0, &mut held), Some(KeyEvent::Released));
        // Release with nothing held is silent
        assert_eq!(key_edge(0, &mut held), None);
    }
}
