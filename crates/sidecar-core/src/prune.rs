//! History pruning and outgoing turn construction.
//!
//! Attachments dominate payload size, so older turns lose them before the
//! transcript is replayed upstream. Model attachments are never replayed:
//! generated binary parts lack the continuation token the provider requires
//! to accept them back as history.

use crate::session::{Attachment, ConversationHistory, Message, Part, Role, Turn, TurnRole};

/// Number of trailing messages that keep their attachments under auto-prune.
pub const AUTO_PRUNE_KEEP_RECENT: usize = 2;

/// Applies the attachment pruning policy to a transcript.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryPruner {
    auto_prune: bool,
}

impl HistoryPruner {
    pub fn new(auto_prune: bool) -> Self {
        Self { auto_prune }
    }

    pub fn is_enabled(&self) -> bool {
        self.auto_prune
    }

    pub fn set_enabled(&mut self, auto_prune: bool) {
        self.auto_prune = auto_prune;
    }

    /// Return the history to replay, pruned when auto-prune is enabled.
    pub fn prepare(&self, history: &ConversationHistory) -> ConversationHistory {
        if self.auto_prune {
            apply_auto_prune(history)
        } else {
            history.clone()
        }
    }

    /// Strip every attachment from `history` in place, returning how many were removed.
    pub fn strip_all(history: &mut ConversationHistory) -> usize {
        history.clear_all_attachments()
    }
}

/// Strip attachments from every message except the last two.
pub fn apply_auto_prune(history: &ConversationHistory) -> ConversationHistory {
    let keep_from = history.len().saturating_sub(AUTO_PRUNE_KEEP_RECENT);

    let messages = history
        .iter()
        .enumerate()
        .map(|(index, message)| {
            let mut message = message.clone();
            if index < keep_from {
                message.clear_attachments();
            }
            message
        })
        .collect();

    ConversationHistory::from_messages(messages)
}

/// Map transcript messages to provider turns.
///
/// System messages are skipped. User turns carry attachments first, then text.
/// Model turns carry text only. Messages yielding no parts are omitted.
pub fn build_outgoing_turns(messages: &[Message]) -> Vec<Turn> {
    messages
        .iter()
        .filter_map(|message| {
            let (role, parts) = match message.role {
                Role::System => return None,
                Role::User => (TurnRole::User, user_parts(message.attachments(), &message.content)),
                Role::Model => (TurnRole::Model, text_parts(&message.content)),
            };

            if parts.is_empty() {
                None
            } else {
                Some(Turn::new(role, parts))
            }
        })
        .collect()
}

/// Parts for a user turn: inline data for each attachment, then the text if non-empty.
pub fn user_parts(attachments: &[Attachment], text: &str) -> Vec<Part> {
    let mut parts: Vec<Part> = attachments
        .iter()
        .filter(|attachment| attachment.has_payload())
        .map(|attachment| Part::inline_data(&attachment.mime_type, &attachment.data))
        .collect();
    parts.extend(text_parts(text));
    parts
}

fn text_parts(text: &str) -> Vec<Part> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Part::text(text)]
    }
}
