//! Canned single-shot actions over a code snippet.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sidecar_core::ModelType;

/// Quick actions always run on the low latency model.
pub const QUICK_ACTION_MODEL: ModelType = ModelType::Fast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuickAction {
    Explain,
    Refactor,
    Fix,
    Tests,
}

impl QuickAction {
    pub const ALL: [QuickAction; 4] = [Self::Explain, Self::Refactor, Self::Fix, Self::Tests];

    /// Task sent to the model.
    pub fn task_prompt(&self) -> &'static str {
        match self {
            Self::Explain => "Explain this code briefly and highlight key points.",
            Self::Refactor => {
                "Refactor this code applying Clean Code and SOLID principles. Explain the changes."
            }
            Self::Fix => {
                "Analyze this code for potential errors or bugs and propose a corrected solution."
            }
            Self::Tests => {
                "Generate robust Unit Tests (using Vitest/Jest) for this code, covering edge cases."
            }
        }
    }

    /// Text shown as the user message in the transcript.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Explain => "Explain",
            Self::Refactor => "Refactor",
            Self::Fix => "Fix",
            Self::Tests => "Tests",
        }
    }

    /// Full prompt for `code`.
    pub fn build_prompt(&self, code: &str) -> String {
        format!("TASK: {}\n\nCODE:\n```\n{}\n```", self.task_prompt(), code)
    }
}

impl FromStr for QuickAction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "explain" => Ok(Self::Explain),
            "refactor" => Ok(Self::Refactor),
            "fix" => Ok(Self::Fix),
            "tests" | "test" => Ok(Self::Tests),
            other => Err(format!(
                "unknown quick action '{other}' (expected explain, refactor, fix or tests)"
            )),
        }
    }
}
