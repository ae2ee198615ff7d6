//! Text injection module
//!
//! Delivers recognised text to the focused window through the ydotool
//! virtual-input daemon. The daemon is an external supervisor's job
//! (systemd); this module is strictly a client of its socket.
//!
//! The trait seam mirrors the recorder's: the daemon loop is tested with an
//! in-memory fake, only `ydotool::YdotoolInjector` shells out.

pub mod ydotool;

use crate::error::InjectError;
use async_trait::async_trait;

/// Trait for text injection implementations
#[async_trait]
pub trait TextInjector: Send + Sync {
    /// Deliver one recognised segment, blocking until the injection
    /// command completes. No retry on failure.
    async fn inject(&self, text: &str) -> Result<(), InjectError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
