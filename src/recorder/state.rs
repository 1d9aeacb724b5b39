//! Recording state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a recording session.
///
/// Idle is initial, Finished is terminal, and Recording and Paused
/// alternate while capture is incomplete. Owned exclusively by the
/// recorder; no other task mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    Idle,
    /// Currently capturing frames
    Recording,
    /// Capture suspended; resumable
    Paused,
    /// Recording completed; terminal
    Finished,
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::Idle
    }
}

impl RecordingState {
    /// Check whether a transition to `target` is legal.
    pub fn can_transition_to(&self, target: RecordingState) -> bool {
        use RecordingState::*;

        match (self, target) {
            (Idle, Recording) => true,
            (Recording, Paused) | (Paused, Recording) => true,
            (Recording, Finished) | (Paused, Finished) => true,
            // Finished is terminal
            (Finished, _) => false,
            // Self-transitions
            (a, b) if *a == b => true,
            _ => false,
        }
    }

    /// Whether a session is underway (recording or paused).
    pub fn is_active(&self) -> bool {
        matches!(self, RecordingState::Recording | RecordingState::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordingState::Finished)
    }
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordingState::Idle => "Idle",
            RecordingState::Recording => "Recording",
            RecordingState::Paused => "Paused",
            RecordingState::Finished => "Finished",
        };
        write!(f, "{name}")
    }
}
