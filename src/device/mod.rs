//! Raw input device module
//!
//! Kernel-level key event detection using evdev. Reading /dev/input works on
//! every compositor because it bypasses the display server entirely, which is
//! why the daemon runs privileged.
//!
//! The reader filters the device's full event stream down to edge transitions
//! of one configured key: autorepeat is discarded, and only released→held and
//! held→released transitions are reported.

pub mod evdev_reader;
pub mod resolve;

pub use evdev_reader::DeviceReader;

use crate::error::DeviceError;
use evdev::Key;

/// Edge events for the configured hold-to-talk key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// The key went from released to held
    Pressed,
    /// The key went from held to released
    Released,
}

/// Parse a key name string to an evdev Key
///
/// Accepts names with or without the KEY_ prefix, case-insensitive,
/// with - or space in place of _.
pub fn parse_key_name(name: &str) -> Result<Key, DeviceError> {
    let normalized: String = name
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();

    let key_name = normalized
        .strip_prefix("KEY_")
        .unwrap_or(&normalized)
        .to_string();

    let key = match key_name.as_str() {
        // Modifiers (RIGHTCTRL is the classic hold-to-talk choice)
        "LEFTCTRL" | "LCTRL" => Key::KEY_LEFTCTRL,
        "RIGHTCTRL" | "RCTRL" => Key::KEY_RIGHTCTRL,
        "LEFTALT" | "LALT" => Key::KEY_LEFTALT,
        "RIGHTALT" | "RALT" => Key::KEY_RIGHTALT,
        "LEFTSHIFT" | "LSHIFT" => Key::KEY_LEFTSHIFT,
        "RIGHTSHIFT" | "RSHIFT" => Key::KEY_RIGHTSHIFT,
        "LEFTMETA" | "SUPER" => Key::KEY_LEFTMETA,
        "RIGHTMETA" => Key::KEY_RIGHTMETA,

        // Lock and navigation keys that rarely conflict with typing
        "SCROLLLOCK" => Key::KEY_SCROLLLOCK,
        "PAUSE" => Key::KEY_PAUSE,
        "CAPSLOCK" => Key::KEY_CAPSLOCK,
        "NUMLOCK" => Key::KEY_NUMLOCK,
        "INSERT" => Key::KEY_INSERT,
        "HOME" => Key::KEY_HOME,
        "END" => Key::KEY_END,
        "MENU" | "COMPOSE" => Key::KEY_COMPOSE,

        // Function keys; F13-F24 usually have no other binding
        "F1" => Key::KEY_F1,
        "F2" => Key::KEY_F2,
        "F3" => Key::KEY_F3,
        "F4" => Key::KEY_F4,
        "F5" => Key::KEY_F5,
        "F6" => Key::KEY_F6,
        "F7" => Key::KEY_F7,
        "F8" => Key::KEY_F8,
        "F9" => Key::KEY_F9,
        "F10" => Key::KEY_F10,
        "F11" => Key::KEY_F11,
        "F12" => Key::KEY_F12,
        "F13" => Key::KEY_F13,
        "F14" => Key::KEY_F14,
        "F15" => Key::KEY_F15,
        "F16" => Key::KEY_F16,
        "F17" => Key::KEY_F17,
        "F18" => Key::KEY_F18,
        "F19" => Key::KEY_F19,
        "F20" => Key::KEY_F20,
        "F21" => Key::KEY_F21,
        "F22" => Key::KEY_F22,
        "F23" => Key::KEY_F23,
        "F24" => Key::KEY_F24,

        _ => return Err(DeviceError::UnknownKey(name.to_string())),
    };

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_name() {
        assert_eq!(parse_key_name("RIGHTCTRL").unwrap(), Key::KEY_RIGHTCTRL);
        assert_eq!(parse_key_name("rightctrl").unwrap(), Key::KEY_RIGHTCTRL);
        assert_eq!(parse_key_name("KEY_RIGHTCTRL").unwrap(), Key::KEY_RIGHTCTRL);
        assert_eq!(parse_key_name("right-ctrl").unwrap(), Key::KEY_RIGHTCTRL);
        assert_eq!(parse_key_name("F13").unwrap(), Key::KEY_F13);
        assert_eq!(parse_key_name("scrolllock").unwrap(), Key::KEY_SCROLLLOCK);
    }

    #[test]
    fn test_parse_key_name_error() {
        assert!(matches!(
            parse_key_name("NOT_A_KEY"),
            Err(DeviceError::UnknownKey(_))
        ));
    }
}
