use serde::{Deserialize, Serialize};

/// Events that drive [`super::TurnState`] transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnEvent {
    /// User message and placeholder appended, request built.
    Submitted,

    /// First chunk arrived.
    StreamStarted,

    ChunkReceived,

    /// Transport finished without error.
    StreamEnded,

    /// User stopped the turn.
    Stopped,

    TransportFailed { error: String },

    /// Outcome recorded, ready for the next turn.
    Settled,
}
