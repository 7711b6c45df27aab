//! Turn states - lifecycle of a single generation turn

use serde::{Deserialize, Serialize};

/// Lifecycle of the in-flight turn.
///
/// `Completed`, `Aborted` and `Failed` are settling states; the controller
/// always moves back to `Idle` right after recording them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// No turn in flight; submits are accepted.
    Idle,

    /// Request issued, no chunk received yet.
    Sending,

    /// Receiving chunks.
    Streaming,

    /// Stream ended normally.
    Completed,

    /// Stopped by the user.
    Aborted,

    /// Transport error.
    Failed { error: String },
}

impl TurnState {
    /// Whether a turn is currently in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }
}
