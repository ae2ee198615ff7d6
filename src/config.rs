//! Configuration loading and types for holdtype
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (/etc/holdtype/config.toml)
//! 3. Environment variables (HOLDTYPE_*)
//! 4. CLI arguments (highest priority)
//!
//! The daemon runs as root, so the config lives under /etc rather than a
//! per-user XDG directory. All values are read once at startup; components
//! receive the config by reference and never consult ambient state.

use crate::error::HoldtypeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Holdtype Configuration
#
# Location: /etc/holdtype/config.toml
# All settings can be overridden via CLI flags

# Desktop user that owns the graphical session. The capture subprocess runs
# under this identity so the user's audio routing applies, and the injector
# socket is resolved from this user's runtime directory.
target_user = "changeme"

[device]
# evdev device node to watch, or "auto" to scan /dev/input for a device
# reporting the trigger key. A stale path is re-resolved automatically when
# the device disappears.
path = "auto"

# Key to hold for dictation (evdev KEY_* name, without the KEY_ prefix).
# Common choices: RIGHTCTRL, SCROLLLOCK, PAUSE, F13-F24. Use `holdtype
# detect` or evtest to find key names.
key = "RIGHTCTRL"

# How often to retry re-resolving a lost device before giving up,
# and the base delay between attempts (grows linearly).
# reopen_attempts = 5
# reopen_delay_ms = 500

[recorder]
# Capture binary. Invoked with explicit format flags; anything that accepts
# arecord-style -f/-r/-c and an output path works.
binary = "arecord"

# Where the recorded audio lands. Overwritten each session, never accumulated.
audio_file = "/tmp/holdtype.wav"

# Capture format (whisper expects 16kHz mono S16_LE; change at your peril)
sample_rate = 16000
channels = 1

# How long to wait for the recorder to flush after SIGTERM before force-kill
# stop_timeout_ms = 2000

# Display values exported to the capture subprocess
# display = ":0"
# wayland_display = "wayland-0"   # omit to auto-detect from the runtime dir

[whisper]
# Model to use for transcription
# Options: tiny, tiny.en, base, base.en, small, small.en, medium, medium.en, large-v3, large-v3-turbo
# Or provide an absolute path to a custom .bin model file
model = "small"

# Language for transcription ("auto" for auto-detection)
language = "en"

# Compute device policy:
# - "auto": use an accelerator when this build carries one, else CPU
# - "cpu": force CPU
# - "accelerated": require an accelerator, fail at startup if absent
device = "auto"

# Number of CPU threads for inference (omit for auto-detection)
# threads = 4

# Abort a transcription that runs longer than this many seconds (0 = never)
# timeout_secs = 120

[inject]
# Virtual-input client binary
binary = "ydotool"

# ydotoold socket path, or "auto" for /run/user/<uid>/.ydotool_socket of the
# target user. The daemon never starts ydotoold; systemd owns it.
socket = "auto"

# Delay between injected keystrokes in milliseconds (0 = fastest)
key_delay_ms = 12
"#;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Desktop user that owns the graphical session and receives typed text
    #[serde(default)]
    pub target_user: String,

    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub whisper: WhisperConfig,
    #[serde(default)]
    pub inject: InjectConfig,
}

/// Input device configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Device node path, or "auto" to scan for one
    #[serde(default = "default_device_path")]
    pub path: String,

    /// Key name (evdev KEY_* constant name, without the KEY_ prefix)
    #[serde(default = "default_trigger_key")]
    pub key: String,

    /// Re-resolution attempts after a lost device before giving up
    #[serde(default = "default_reopen_attempts")]
    pub reopen_attempts: u32,

    /// Base delay between re-resolution attempts in milliseconds
    #[serde(default = "default_reopen_delay_ms")]
    pub reopen_delay_ms: u64,
}

/// Audio capture subprocess configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderConfig {
    /// Capture binary (arecord-compatible flags)
    #[serde(default = "default_recorder_binary")]
    pub binary: String,

    /// Output path for the recorded audio, overwritten each session
    #[serde(default = "default_audio_file")]
    pub audio_file: PathBuf,

    /// Sample rate in Hz (whisper expects 16000)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Channel count (whisper expects mono)
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Grace period after SIGTERM before the subprocess is force-killed
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// DISPLAY exported to the capture subprocess
    #[serde(default = "default_display")]
    pub display: String,

    /// WAYLAND_DISPLAY override; auto-detected from the runtime dir when unset
    #[serde(default)]
    pub wayland_display: Option<String>,
}

/// Compute device policy for the whisper backend
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    /// Prefer an accelerator, silently fall back to CPU
    #[default]
    Auto,
    /// Force CPU
    Cpu,
    /// Require an accelerator, fail fast if absent
    Accelerated,
}

/// Whisper speech-to-text configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhisperConfig {
    /// Model name: tiny, base, small, medium, large-v3, large-v3-turbo
    /// Can also be an absolute path to a .bin file
    #[serde(default = "default_model")]
    pub model: String,

    /// Language code (en, es, fr, auto, etc.)
    #[serde(default = "default_language")]
    pub language: String,

    /// Compute device policy
    #[serde(default)]
    pub device: ComputeDevice,

    /// Number of threads for inference (None = auto-detect)
    #[serde(default)]
    pub threads: Option<usize>,

    /// Transcription timeout in seconds, 0 to disable
    #[serde(default = "default_transcribe_timeout")]
    pub timeout_secs: u64,
}

/// Text injection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InjectConfig {
    /// Virtual-input client binary
    #[serde(default = "default_inject_binary")]
    pub binary: String,

    /// Socket path, or "auto" to derive from the target user's runtime dir
    #[serde(default = "default_socket")]
    pub socket: String,

    /// Delay between injected keystrokes in milliseconds
    #[serde(default = "default_key_delay_ms")]
    pub key_delay_ms: u32,
}

fn default_device_path() -> String {
    "auto".to_string()
}

fn default_trigger_key() -> String {
    "RIGHTCTRL".to_string()
}

fn default_reopen_attempts() -> u32 {
    5
}

fn default_reopen_delay_ms() -> u64 {
    500
}

fn default_recorder_binary() -> String {
    "arecord".to_string()
}

fn default_audio_file() -> PathBuf {
    PathBuf::from("/tmp/holdtype.wav")
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_channels() -> u16 {
    1
}

fn default_stop_timeout_ms() -> u64 {
    2000
}

fn default_display() -> String {
    ":0".to_string()
}

fn default_model() -> String {
    "small".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_transcribe_timeout() -> u64 {
    120
}

fn default_inject_binary() -> String {
    "ydotool".to_string()
}

fn default_socket() -> String {
    "auto".to_string()
}

fn default_key_delay_ms() -> u32 {
    12
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: default_device_path(),
            key: default_trigger_key(),
            reopen_attempts: default_reopen_attempts(),
            reopen_delay_ms: default_reopen_delay_ms(),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            binary: default_recorder_binary(),
            audio_file: default_audio_file(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            stop_timeout_ms: default_stop_timeout_ms(),
            display: default_display(),
            wayland_display: None,
        }
    }
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            language: default_language(),
            device: ComputeDevice::default(),
            threads: None,
            timeout_secs: default_transcribe_timeout(),
        }
    }
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            binary: default_inject_binary(),
            socket: default_socket(),
            key_delay_ms: default_key_delay_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_user: String::new(),
            device: DeviceConfig::default(),
            recorder: RecorderConfig::default(),
            whisper: WhisperConfig::default(),
            inject: InjectConfig::default(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("/etc/holdtype/config.toml")
    }

    /// Get the models directory path
    pub fn models_dir() -> PathBuf {
        PathBuf::from("/var/lib/holdtype/models")
    }

    /// Check startup-fatal misconfiguration before any component is built
    pub fn validate(&self) -> Result<(), HoldtypeError> {
        if self.target_user.is_empty() || self.target_user == "changeme" {
            return Err(HoldtypeError::Config(
                "target_user is not set. Edit /etc/holdtype/config.toml and name the desktop user."
                    .to_string(),
            ));
        }
        if self.recorder.sample_rate == 0 || self.recorder.channels == 0 {
            return Err(HoldtypeError::Config(
                "recorder sample_rate and channels must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, HoldtypeError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).unwrap_or_else(Config::default_path);

    if config_path.exists() {
        tracing::debug!("Loading config from {:?}", config_path);
        let contents = std::fs::read_to_string(&config_path)
            .map_err(|e| HoldtypeError::Config(format!("Failed to read config: {}", e)))?;

        config = toml::from_str(&contents)
            .map_err(|e| HoldtypeError::Config(format!("Invalid config: {}", e)))?;
    } else if path.is_some() {
        // An explicitly named file that does not exist is a hard error;
        // a missing default file just means defaults.
        return Err(HoldtypeError::Config(format!(
            "Config file not found: {:?}",
            config_path
        )));
    } else {
        tracing::debug!("No config file at {:?}, using defaults", config_path);
    }

    // Override from environment variables
    if let Ok(user) = std::env::var("HOLDTYPE_TARGET_USER") {
        config.target_user = user;
    }
    if let Ok(key) = std::env::var("HOLDTYPE_KEY") {
        config.device.key = key;
    }
    if let Ok(model) = std::env::var("HOLDTYPE_MODEL") {
        config.whisper.model = model;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.device.key, "RIGHTCTRL");
        assert_eq!(config.device.path, "auto");
        assert_eq!(config.recorder.sample_rate, 16000);
        assert_eq!(config.recorder.channels, 1);
        assert_eq!(config.whisper.device, ComputeDevice::Auto);
        assert_eq!(config.inject.key_delay_ms, 12);
    }

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.target_user, "changeme");
        assert_eq!(config.whisper.model, "small");
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
            target_user = "micha"

            [device]
            path = "/dev/input/event4"
            key = "SCROLLLOCK"

            [recorder]
            audio_file = "/tmp/dictation.wav"

            [whisper]
            model = "base.en"
            device = "accelerated"

            [inject]
            key_delay_ms = 0
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.target_user, "micha");
        assert_eq!(config.device.path, "/dev/input/event4");
        assert_eq!(config.device.key, "SCROLLLOCK");
        assert_eq!(config.device.reopen_attempts, 5); // default
        assert_eq!(config.recorder.audio_file, PathBuf::from("/tmp/dictation.wav"));
        assert_eq!(config.recorder.binary, "arecord"); // default
        assert_eq!(config.whisper.device, ComputeDevice::Accelerated);
        assert_eq!(config.inject.key_delay_ms, 0);
    }

    #[test]
    fn test_validate_rejects_placeholder_user() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.target_user = "micha".to_string();
        assert!(config.validate().is_ok());
    }
}
