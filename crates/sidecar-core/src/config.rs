use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::budget::DEFAULT_CONTEXT_LIMIT;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "Act as a world-class frontend software architect obsessed with technical excellence and the state of the art.

YOUR STRENGTHS:
1. **Modern frontend**: React 19, advanced TypeScript, performance (Core Web Vitals), modern CSS and hexagonal architecture on the client.
2. **Micro-frontends**: widgets, content APIs and embedding React/Vue into host platforms cleanly.
3. **Obsessive quality**: your code is SOLID, clean and testable by default. You hate technical debt.
4. **Visual output**: image generation is enabled. If asked for a diagram, a logo or an image, generate it.

YOUR PERSONALITY:
- Direct, technical and extremely competent.
- You do not ship patches, you ship architecture.
- If you see mediocre code, you refactor it into something brilliant.

FORMAT:
- Use Markdown.
- When writing code, always state the language and the suggested path.";

const CONFIG_FILE_PATH: &str = "config.toml";

/// Generation model tier.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Low latency model used for quick actions.
    Fast,
    /// Reasoning model with search grounding and a thinking budget.
    #[default]
    Smart,
}

impl ModelType {
    pub fn model_id(&self) -> &'static str {
        match self {
            Self::Fast => "gemini-2.5-flash-image",
            Self::Smart => "gemini-3-pro-image-preview",
        }
    }

    pub fn supports_search(&self) -> bool {
        matches!(self, Self::Smart)
    }

    pub fn thinking_budget(&self) -> Option<u32> {
        match self {
            Self::Fast => None,
            Self::Smart => Some(1024),
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fast" | "flash" => Ok(Self::Fast),
            "smart" | "pro" => Ok(Self::Smart),
            other => Err(format!("unknown model type: {other}")),
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Smart => write!(f, "smart"),
        }
    }
}

/// Limit and pruning policy used when building each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    pub limit: u32,
    pub auto_prune: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_CONTEXT_LIMIT,
            auto_prune: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,
    #[serde(default = "default_context_limit")]
    pub context_limit: u32,
    #[serde(default)]
    pub auto_prune_images: bool,
    #[serde(default)]
    pub model: ModelType,
    #[serde(default)]
    pub use_search: bool,
}

fn default_system_instruction() -> String {
    DEFAULT_SYSTEM_INSTRUCTION.to_string()
}

fn default_context_limit() -> u32 {
    DEFAULT_CONTEXT_LIMIT
}

pub fn sidecar_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".gemini-sidecar")
}

fn sidecar_config_json_path(dir: &Path) -> PathBuf {
    dir.join("config.json")
}

pub fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            system_instruction: default_system_instruction(),
            context_limit: DEFAULT_CONTEXT_LIMIT,
            auto_prune_images: false,
            model: ModelType::default(),
            use_search: false,
        }
    }
}

impl Settings {
    /// Load from `~/.gemini-sidecar/config.json`, falling back to `./config.toml`,
    /// then apply environment overrides.
    pub fn load() -> Self {
        let mut settings = Self::load_from(&sidecar_dir(), Path::new(CONFIG_FILE_PATH));
        settings.apply_env_overrides();
        settings
    }

    /// Read settings from `dir/config.json`, or `toml_path` if that is absent or invalid.
    pub fn load_from(dir: &Path, toml_path: &Path) -> Self {
        let mut settings = Settings::default();

        let mut loaded = false;
        let json_path = sidecar_config_json_path(dir);
        if json_path.exists() {
            match std::fs::read_to_string(&json_path) {
                Ok(content) => match serde_json::from_str::<Settings>(&content) {
                    Ok(file_settings) => {
                        settings = file_settings;
                        loaded = true;
                    }
                    Err(error) => {
                        log::warn!("Ignoring invalid {}: {}", json_path.display(), error)
                    }
                },
                Err(error) => log::warn!("Failed to read {}: {}", json_path.display(), error),
            }
        }

        if !loaded && toml_path.exists() {
            if let Ok(content) = std::fs::read_to_string(toml_path) {
                if let Ok(file_settings) = toml::from_str::<Settings>(&content) {
                    settings = file_settings;
                }
            }
        }

        settings.normalize();
        settings
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an environment-like lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_key) = lookup("GEMINI_API_KEY") {
            self.api_key = Some(api_key);
        }
        if let Some(limit) = lookup("SIDECAR_CONTEXT_LIMIT") {
            match limit.trim().parse::<u32>() {
                Ok(limit) => self.context_limit = limit,
                Err(_) => log::warn!("Ignoring invalid SIDECAR_CONTEXT_LIMIT: {}", limit),
            }
        }
        if let Some(auto_prune) = lookup("SIDECAR_AUTO_PRUNE") {
            self.auto_prune_images = parse_bool_env(&auto_prune);
        }
        if let Some(model) = lookup("SIDECAR_MODEL") {
            match model.parse() {
                Ok(model) => self.model = model,
                Err(error) => log::warn!("Ignoring SIDECAR_MODEL: {}", error),
            }
        }
        self.normalize();
    }

    /// Write the settings as pretty JSON to `dir/config.json`.
    pub fn save_to(&self, dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(sidecar_config_json_path(dir), content)
    }

    pub fn has_credential(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub fn context_config(&self) -> ContextConfig {
        ContextConfig {
            limit: self.context_limit,
            auto_prune: self.auto_prune_images,
        }
    }

    /// Replace a zero context limit and a blank system instruction with defaults.
    pub fn normalize(&mut self) {
        if self.context_limit == 0 {
            self.context_limit = DEFAULT_CONTEXT_LIMIT;
        }
        if self.system_instruction.trim().is_empty() {
            self.system_instruction = default_system_instruction();
        }
    }
}
