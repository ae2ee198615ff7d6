//! ydotool-based text injection
//!
//! ydotool types through the uinput kernel interface, so it works on every
//! compositor. It needs its daemon (ydotoold) running with a socket the
//! client can reach; a missing socket is the single most common operational
//! fault and gets its own error variant with an actionable message.

use super::TextInjector;
use crate::config::InjectConfig;
use crate::error::InjectError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// ydotool-based text injector
pub struct YdotoolInjector {
    /// Resolved client binary
    binary: PathBuf,
    /// ydotoold socket, created by the external daemon
    socket_path: PathBuf,
    /// Delay between keystrokes in milliseconds
    key_delay_ms: u32,
}

impl YdotoolInjector {
    /// Resolve the client binary and socket path. Binary resolution here
    /// makes a missing ydotool a startup fault instead of a surprise on
    /// the first gesture; socket liveness stays a per-injection check
    /// because ydotoold may come up after us.
    pub fn new(config: &InjectConfig, target_uid: u32) -> Result<Self, InjectError> {
        let binary = which::which(&config.binary)
            .map_err(|_| InjectError::InjectorMissing(config.binary.clone()))?;
        let socket_path = resolve_socket_path(&config.socket, target_uid);

        tracing::debug!(
            "Injector: {} via socket {}",
            binary.display(),
            socket_path.display()
        );

        Ok(Self {
            binary,
            socket_path,
            key_delay_ms: config.key_delay_ms,
        })
    }
}

#[async_trait]
impl TextInjector for YdotoolInjector {
    async fn inject(&self, text: &str) -> Result<(), InjectError> {
        if !self.socket_path.exists() {
            return Err(InjectError::SocketMissing(self.socket_path.clone()));
        }

        let mut cmd = Command::new(&self.binary);
        cmd.arg("type");
        if self.key_delay_ms > 0 {
            cmd.arg("--key-delay").arg(self.key_delay_ms.to_string());
        }
        // The -- ensures text starting with - isn't treated as an option
        cmd.arg("--").arg(payload(text));
        cmd.env("YDOTOOL_SOCKET", &self.socket_path);

        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InjectError::InjectorMissing(self.binary.display().to_string())
                } else {
                    InjectError::InjectionFailed(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InjectError::InjectionFailed(stderr.trim().to_string()));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "ydotool"
    }
}

/// The delivered payload: the segment plus one trailing space, so
/// consecutive utterances come out word-separated.
fn payload(text: &str) -> String {
    format!("{} ", text)
}

/// Resolve the socket path: explicit, or the target user's runtime dir.
pub fn resolve_socket_path(configured: &str, target_uid: u32) -> PathBuf {
    if configured == "auto" {
        PathBuf::from(format!("/run/user/{}/.ydotool_socket", target_uid))
    } else {
        PathBuf::from(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_appends_single_trailing_space() {
        assert_eq!(payload("hello world"), "hello world ");
        assert_eq!(payload("turn on the lights"), "turn on the lights ");
    }

    #[test]
    fn test_resolve_socket_path_auto() {
        assert_eq!(
            resolve_socket_path("auto", 1000),
            PathBuf::from("/run/user/1000/.ydotool_socket")
        );
    }

    #[test]
    fn test_resolve_socket_path_explicit() {
        assert_eq!(
            resolve_socket_path("/tmp/ydotoold.sock", 1000),
            PathBuf::from("/tmp/ydotoold.sock")
        );
    }

    #[tokio::test]
    async fn test_inject_fails_when_socket_missing() {
        let injector = YdotoolInjector {
            binary: PathBuf::from("/usr/bin/ydotool"),
            socket_path: PathBuf::from("/nonexistent/.ydotool_socket"),
            key_delay_ms: 0,
        };

        match injector.inject("hello").await {
            Err(InjectError::SocketMissing(path)) => {
                assert_eq!(path, Path::new("/nonexistent/.ydotool_socket"));
            }
            other => panic!("expected SocketMissing, got {:?}", other),
        }
    }
}
