//! State machine for the holdtype daemon
//!
//! One gesture walks Idle → Recording → Transcribing → Injecting → Idle.
//! The daemon holds exactly one of these at a time; overlapping gestures
//! are rejected at the transition, never queued.

use std::time::Instant;

/// Application state
#[derive(Debug)]
pub enum State {
    /// Waiting for the hold key
    Idle,

    /// Key held, capture subprocess running
    Recording {
        /// When recording started
        started_at: Instant,
    },

    /// Key released, whisper inference in flight
    Transcribing,

    /// Delivering recognised segments to the focused window
    Injecting {
        /// Segments in this utterance
        total: usize,
    },
}

impl State {
    /// Check if in idle state
    pub fn is_idle(&self) -> bool {
        matches!(self, State::Idle)
    }

    /// Check if in recording state
    pub fn is_recording(&self) -> bool {
        matches!(self, State::Recording { .. })
    }

    /// Get recording duration if currently recording
    pub fn recording_duration(&self) -> Option<std::time::Duration> {
        match self {
            State::Recording { started_at } => Some(started_at.elapsed()),
            _ => None,
        }
    }
}

impl Default for State {
    fn default() -> Self {
        State::Idle
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::Recording { started_at } => {
                write!(f, "Recording ({:.1}s)", started_at.elapsed().as_secs_f32())
            }
            State::Transcribing => write!(f, "Transcribing"),
            State::Injecting { total } => write!(f, "Injecting {} segment(s)", total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        let state = State::default();
        assert!(state.is_idle());
        assert!(state.recording_duration().is_none());
    }

    #[test]
    fn test_recording_state() {
        let state = State::Recording {
            started_at: Instant::now(),
        };
        assert!(state.is_recording());
        assert!(!state.is_idle());
        assert!(state.recording_duration().is_some());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", State::Idle), "Idle");
        assert_eq!(format!("{}", State::Transcribing), "Transcribing");
        assert!(format!(
            "{}",
            State::Recording {
                started_at: Instant::now()
            }
        )
        .starts_with("Recording"));
    }
}
