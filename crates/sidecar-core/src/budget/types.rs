//! Core types for context budget tracking.

use serde::{Deserialize, Serialize};

/// Default context limit in tokens (safe for free tier quotas and UI latency).
pub const DEFAULT_CONTEXT_LIMIT: u32 = 100_000;
/// Usage above this percentage is reported as a warning.
pub const WARNING_THRESHOLD_PERCENT: f64 = 80.0;
/// Usage above this percentage requires confirmation before sending.
pub const CRITICAL_THRESHOLD_PERCENT: f64 = 95.0;

/// Derived context usage for the current transcript.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageStats {
    /// Estimated tokens consumed
    pub used: u32,
    /// Configured context limit
    pub total: u32,
    /// `used / total * 100`, capped at 100
    pub percentage: f64,
    pub is_warning: bool,
    pub is_critical: bool,
    /// Attachments across the whole transcript
    pub image_count: usize,
}

impl TokenUsageStats {
    pub fn from_usage(used: u32, total: u32, image_count: usize) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            ((used as f64 / total as f64) * 100.0).min(100.0)
        };

        Self {
            used,
            total,
            percentage,
            is_warning: percentage > WARNING_THRESHOLD_PERCENT,
            is_critical: percentage > CRITICAL_THRESHOLD_PERCENT,
            image_count,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.used)
    }
}
