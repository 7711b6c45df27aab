use crate::types::StreamChunk;
use async_trait::async_trait;
use futures::Stream;
use sidecar_core::{ModelType, Part, Turn};
use std::pin::Pin;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Protocol conversion error: {0}")]
    Protocol(#[from] crate::protocol::ProtocolError),

    #[error("Request cancelled")]
    Cancelled,
}

impl LLMError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, LLMError>;

pub type LLMStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Everything the transport needs for one generation call.
#[derive(Clone)]
pub struct GenerationRequest {
    pub api_key: String,
    pub model: ModelType,
    pub system_instruction: Option<String>,
    /// Prior turns replayed as history.
    pub history: Vec<Turn>,
    /// Parts of the new user turn.
    pub message: Vec<Part>,
    pub use_search: bool,
}

impl GenerationRequest {
    pub fn new(api_key: impl Into<String>, model: ModelType, message: Vec<Part>) -> Self {
        Self {
            api_key: api_key.into(),
            model,
            system_instruction: None,
            history: Vec::new(),
            message,
            use_search: false,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        let instruction = instruction.into();
        self.system_instruction = if instruction.is_empty() {
            None
        } else {
            Some(instruction)
        };
        self
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_search(mut self, use_search: bool) -> Self {
        self.use_search = use_search;
        self
    }

    /// Search grounding is only sent to models that support it.
    pub fn search_enabled(&self) -> bool {
        self.use_search && self.model.supports_search()
    }
}

impl std::fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("system_instruction", &self.system_instruction.as_ref().map(String::len))
            .field("history", &self.history.len())
            .field("message", &self.message.len())
            .field("use_search", &self.use_search)
            .finish()
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Start a streamed generation.
    ///
    /// The returned stream ends early once `cancel` is triggered; a request
    /// cancelled before the response arrives fails with [`LLMError::Cancelled`].
    async fn chat_stream(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<LLMStream>;
}
