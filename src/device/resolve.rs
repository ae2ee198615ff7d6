//! Device path resolution
//!
//! Input device nodes renumber across reboots and hotplug, so a configured
//! path can go stale. Resolution scans /dev/input/event* for a device that
//! advertises the trigger key, falling back to anything keyboard-looking by
//! name. The daemon only calls this on open failure or after losing an
//! already-open device, never speculatively.

use crate::error::DeviceError;
use evdev::{Device, Key};
use std::path::PathBuf;

/// One scanned input device
pub struct DetectedDevice {
    pub path: PathBuf,
    pub name: String,
    /// Device advertises the trigger key in its key capabilities
    pub has_key: bool,
    /// Device name contains a keyboard-ish keyword
    pub keyboard_like: bool,
}

/// Enumerate event devices, lowest event number first.
///
/// Devices that cannot be opened (busy, permissions) are skipped silently;
/// the caller cares about candidates, not about an exhaustive census.
pub fn scan(key: Key) -> Vec<DetectedDevice> {
    let mut paths: Vec<PathBuf> = match std::fs::read_dir("/dev/input") {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("event"))
                    .unwrap_or(false)
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Cannot read /dev/input: {}", e);
            return Vec::new();
        }
    };

    paths.sort_by_key(|p| event_number(p));

    let mut found = Vec::new();
    for path in paths {
        let device = match Device::open(&path) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let name = device.name().unwrap_or("unknown").to_string();
        let has_key = device
            .supported_keys()
            .map(|keys| keys.contains(key))
            .unwrap_or(false);
        let lower = name.to_lowercase();
        let keyboard_like = ["keyboard", "kbd"].iter().any(|kw| lower.contains(kw));

        found.push(DetectedDevice {
            path,
            name,
            has_key,
            keyboard_like,
        });
    }

    found
}

/// Resolve a currently-valid device path for the trigger key.
///
/// Prefers a device that actually reports the key; falls back to the first
/// keyboard-like name for the odd keyboard that under-reports capabilities.
pub fn find_device_for_key(key: Key) -> Result<PathBuf, DeviceError> {
    let devices = scan(key);

    if let Some(d) = devices.iter().find(|d| d.has_key) {
        tracing::info!(
            "Resolved {:?} to {} ({})",
            key,
            d.path.display(),
            d.name
        );
        return Ok(d.path.clone());
    }

    if let Some(d) = devices.iter().find(|d| d.keyboard_like) {
        tracing::info!(
            "No device reports {:?}; using keyboard-like {} ({})",
            key,
            d.path.display(),
            d.name
        );
        return Ok(d.path.clone());
    }

    Err(DeviceError::NoMatchingDevice(format!("{:?}", key)))
}

fn event_number(path: &PathBuf) -> u32 {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix("event"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_number_ordering() {
        assert_eq!(event_number(&PathBuf::from("/dev/input/event3")), 3);
        assert_eq!(event_number(&PathBuf::from("/dev/input/event17")), 17);
        // Non-event names sort last
        assert_eq!(event_number(&PathBuf::from("/dev/input/mice")), u32::MAX);
    }
}
