//! Recording session state machine

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Recorder states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    #[default]
    Idle,
    Recording,
    Rotating,
    Stopping,
}

impl RecorderState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Rotating => "rotating",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the recorder should do with a sample arriving in a given state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDisposition {
    Append,
    Drop,
    Reject,
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while in {current_state} state")]
pub struct InvalidStateTransition {
    pub current_state: RecorderState,
    pub action: String,
}

/// Recording session entity.
/// Owns the lifecycle of one recorder.
///
/// State machine:
///   IDLE -> RECORDING (start)
///   RECORDING -> ROTATING (begin_rotation)
///   ROTATING -> RECORDING (finish_rotation)
///   ROTATING -> IDLE (abort_rotation)
///   RECORDING -> STOPPING (begin_stop)
///   STOPPING -> IDLE (finish_stop)
#[derive(Debug, Default)]
pub struct RecordingSession {
    state: RecorderState,
}

impl RecordingSession {
    /// Create a new session in idle state
    pub fn new() -> Self {
        Self {
            state: RecorderState::Idle,
        }
    }

    /// Get the current state
    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == RecorderState::Idle
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// How a sample delivered right now must be handled
    pub fn sample_disposition(&self) -> SampleDisposition {
        match self.state {
            RecorderState::Recording => SampleDisposition::Append,
            RecorderState::Rotating => SampleDisposition::Drop,
            RecorderState::Idle | RecorderState::Stopping => SampleDisposition::Reject,
        }
    }

    fn transition(
        &mut self,
        from: RecorderState,
        to: RecorderState,
        action: &str,
    ) -> Result<(), InvalidStateTransition> {
        if self.state != from {
            return Err(InvalidStateTransition {
                current_state: self.state,
                action: action.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }

    /// Fail unless a recording could be started now
    pub fn ensure_can_start(&self) -> Result<(), InvalidStateTransition> {
        if self.state != RecorderState::Idle {
            return Err(InvalidStateTransition {
                current_state: self.state,
                action: "start recording".to_string(),
            });
        }
        Ok(())
    }

    /// Transition from IDLE to RECORDING
    pub fn start(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(RecorderState::Idle, RecorderState::Recording, "start recording")
    }

    /// Transition from RECORDING to ROTATING
    pub fn begin_rotation(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(RecorderState::Recording, RecorderState::Rotating, "rotate segment")
    }

    /// Transition from ROTATING back to RECORDING
    pub fn finish_rotation(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(RecorderState::Rotating, RecorderState::Recording, "finish rotation")
    }

    /// Transition from ROTATING to IDLE when the next segment could not be opened
    pub fn abort_rotation(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(RecorderState::Rotating, RecorderState::Idle, "abort rotation")
    }

    /// Transition from RECORDING to STOPPING
    pub fn begin_stop(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(RecorderState::Recording, RecorderState::Stopping, "stop recording")
    }

    /// Transition from STOPPING to IDLE
    pub fn finish_stop(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(RecorderState::Stopping, RecorderState::Idle, "finish stop")
    }
}
