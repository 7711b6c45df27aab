//! Context window budget estimation.
//!
//! Usage is always recomputed from the current transcript, the captured extra
//! context and the configured limit. Nothing here is cached across mutations.
//!
//! # Key Components
//!
//! - [`counter`]: character-based token heuristic (chars/4) and usage calculation
//! - [`types`]: `TokenUsageStats` and the warning/critical thresholds

pub mod counter;
pub mod types;

pub use counter::{calculate_context_usage, estimate_tokens, HeuristicTokenCounter};
pub use types::{
    TokenUsageStats, CRITICAL_THRESHOLD_PERCENT, DEFAULT_CONTEXT_LIMIT, WARNING_THRESHOLD_PERCENT,
};
