use crate::budget::TokenUsageStats;
use serde::{Deserialize, Serialize};

/// Notifications emitted by the session controller for front ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    TurnStarted {
        message_id: String,
    },

    Token {
        message_id: String,
        content: String,
    },

    /// Generated attachments were merged into the placeholder.
    AttachmentsReceived {
        message_id: String,
        count: usize,
    },

    TurnCompleted {
        message_id: String,
    },

    TurnStopped {
        message_id: String,
    },

    TurnFailed {
        message_id: String,
        error: String,
    },

    /// A system notice was appended to the transcript.
    Notice {
        content: String,
    },

    UsageUpdated {
        usage: TokenUsageStats,
    },
}
