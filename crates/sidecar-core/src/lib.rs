//! sidecar-core - Transcript model and session building blocks
//!
//! This crate provides the pieces the session controller composes:
//! - `session` - Message, Attachment, ConversationHistory, errors and events
//! - `budget` - context window usage estimation
//! - `prune` - attachment pruning and outgoing turn construction
//! - `storage` - quota-limited key-value stores and the persistence gateway
//! - `config` - user settings and model selection
//! - `capture` - page/code capture collaborator interface
//! - `export` - Markdown transcript export

pub mod budget;
pub mod capture;
pub mod config;
pub mod export;
pub mod prune;
pub mod session;
pub mod storage;

pub use budget::{calculate_context_usage, estimate_tokens, HeuristicTokenCounter, TokenUsageStats};
pub use capture::{NoCapture, PageCapture};
pub use config::{ContextConfig, ModelType, Settings};
pub use prune::{build_outgoing_turns, HistoryPruner};
pub use session::{
    Attachment, ConversationHistory, GroundingMetadata, Message, Part, Role, SessionError,
    SessionEvent, Turn, TurnRole,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, PersistenceGateway, SaveOutcome, StoreError};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
