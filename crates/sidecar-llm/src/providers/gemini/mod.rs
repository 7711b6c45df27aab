//! Google Gemini provider implementation.

mod stream;

pub use stream::{parse_gemini_sse_event, GeminiStreamState};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::protocol::gemini::GeminiRequest;
use crate::protocol::ToProvider;
use crate::provider::{GenerationRequest, LLMError, LLMProvider, LLMStream, Result};
use crate::providers::common::sse::sse_chunk_stream;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider.
///
/// The API key travels with each request so settings can change between turns.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Set a custom base URL (e.g., for proxies or alternative endpoints).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:streamGenerateContent", self.base_url, model)
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn chat_stream(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<LLMStream> {
        if request.api_key.trim().is_empty() {
            return Err(LLMError::Auth("Gemini API key is missing".to_string()));
        }

        let model = request.model.model_id();
        let body: GeminiRequest = request.to_provider()?;

        log::debug!(
            "Gemini request to {} ({} history turns, search: {})",
            model,
            request.history.len(),
            body.tools.is_some()
        );

        let send = self
            .client
            .post(self.endpoint(model))
            .query(&[("alt", "sse"), ("key", request.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&body)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("Gemini request cancelled before response");
                return Err(LLMError::Cancelled);
            }
            response = send => response.map_err(LLMError::Http)?,
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.map_err(LLMError::Http)?;

            if status == 401 || status == 403 {
                return Err(LLMError::Auth(format!(
                    "Gemini authentication failed: {}. Please check your API key.",
                    text
                )));
            }

            return Err(LLMError::Api(format!(
                "Gemini API error: HTTP {}: {}",
                status, text
            )));
        }

        log::debug!("Gemini stream started successfully");

        let mut state = GeminiStreamState::default();
        let stream = sse_chunk_stream(response, move |data| parse_gemini_sse_event(&mut state, data));

        Ok(Box::pin(stream.take_until(cancel.cancelled_owned())))
    }
}
