//! Gemini SSE stream parser.
//!
//! With `alt=sse` every event is one JSON response object:
//! ```text
//! data: {"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"}}]}
//!
//! data: {"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"..."}}]}}]}
//! ```

use crate::protocol::gemini::GeminiStreamResponse;
use crate::protocol::FromProvider;
use crate::provider::{LLMError, Result};
use crate::types::StreamChunk;

/// Stateful parser for Gemini SSE streaming events.
///
/// Numbers generated images so names stay unique within one stream.
#[derive(Debug, Default)]
pub struct GeminiStreamState {
    images_received: usize,
}

impl GeminiStreamState {
    fn next_image_name(&mut self, mime_type: &str) -> String {
        self.images_received += 1;
        let extension = mime_type
            .split_once('/')
            .map(|(_, subtype)| subtype)
            .filter(|subtype| !subtype.is_empty())
            .unwrap_or("bin");
        format!("generated-image-{}.{}", self.images_received, extension)
    }
}

/// Parse a single Gemini SSE event into an optional [`StreamChunk`].
///
/// Returns:
/// - `Ok(Some(chunk))` for events carrying text, images or grounding metadata
/// - `Ok(None)` for empty data and events with nothing to show
/// - `Err(_)` for malformed JSON or an embedded `error` object
pub fn parse_gemini_sse_event(
    state: &mut GeminiStreamState,
    data: &str,
) -> Result<Option<StreamChunk>> {
    let data = data.trim();

    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let response: GeminiStreamResponse = serde_json::from_str(data)
        .map_err(|e| LLMError::Stream(format!("Failed to parse Gemini SSE data: {}: {}", e, data)))?;

    if let Some(error) = &response.error {
        let message = if error.message.is_empty() {
            "Unknown Gemini API error"
        } else {
            error.message.as_str()
        };
        return Err(LLMError::Api(message.to_string()));
    }

    if let Some(reason) = response
        .candidates
        .first()
        .and_then(|candidate| candidate.finish_reason.as_deref())
    {
        log::debug!("Gemini candidate finished: {}", reason);
    }

    let mut chunk = StreamChunk::from_provider(response)?;
    for attachment in &mut chunk.attachments {
        attachment.name = state.next_image_name(&attachment.mime_type);
    }

    if chunk.is_empty() {
        Ok(None)
    } else {
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(state: &mut GeminiStreamState, data: &str) -> Option<StreamChunk> {
        parse_gemini_sse_event(state, data).expect("parse")
    }

    #[test]
    fn parse_text_chunk() {
        let mut state = GeminiStreamState::default();
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}],"role":"model"}}]}"#;

        let chunk = parse(&mut state, data).expect("chunk");
        assert_eq!(chunk.text.as_deref(), Some("Hello"));
        assert!(chunk.attachments.is_empty());
    }

    #[test]
    fn parse_empty_data_and_done_return_none() {
        let mut state = GeminiStreamState::default();
        assert!(parse(&mut state, "").is_none());
        assert!(parse(&mut state, "   [DONE]   ").is_none());
    }

    #[test]
    fn parse_inline_image_names_sequentially() {
        let mut state = GeminiStreamState::default();
        let data = r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"UE5H"}}],"role":"model"}}]}"#;

        let first = parse(&mut state, data).expect("chunk");
        let second = parse(&mut state, data).expect("chunk");

        assert!(first.text.is_none());
        assert_eq!(first.attachments[0].name, "generated-image-1.png");
        assert_eq!(first.attachments[0].mime_type, "image/png");
        assert_eq!(first.attachments[0].data, "UE5H");
        assert_eq!(second.attachments[0].name, "generated-image-2.png");
    }

    #[test]
    fn parse_grounding_only_chunk() {
        let mut state = GeminiStreamState::default();
        let data = r#"{"candidates":[{"content":{"parts":[],"role":"model"},"groundingMetadata":{"groundingChunks":[{"web":{"uri":"https://tokio.rs","title":"Tokio"}}]}}]}"#;

        let chunk = parse(&mut state, data).expect("chunk");
        let metadata = chunk.grounding_metadata.expect("grounding");
        let sources: Vec<_> = metadata.web_sources().collect();
        assert_eq!(sources[0].uri, "https://tokio.rs");
    }

    #[test]
    fn parse_thought_only_chunk_returns_none() {
        let mut state = GeminiStreamState::default();
        let data = r#"{"candidates":[{"content":{"parts":[{"text":"planning","thought":true}],"role":"model"}}]}"#;
        assert!(parse(&mut state, data).is_none());
    }

    #[test]
    fn parse_empty_candidates_and_missing_content_return_none() {
        let mut state = GeminiStreamState::default();
        assert!(parse(&mut state, r#"{"candidates":[]}"#).is_none());
        assert!(parse(&mut state, r#"{"candidates":[{"finishReason":"STOP"}]}"#).is_none());
        assert!(parse(&mut state, r#"{"usageMetadata":{"totalTokenCount":3}}"#).is_none());
    }

    #[test]
    fn parse_error_response() {
        let mut state = GeminiStreamState::default();
        let data = r#"{"error":{"message":"API key invalid","code":400}}"#;

        let result = parse_gemini_sse_event(&mut state, data);
        match result {
            Err(LLMError::Api(message)) => assert_eq!(message, "API key invalid"),
            other => panic!("expected LLMError::Api, got {:?}", other),
        }
    }

    #[test]
    fn parse_invalid_json() {
        let mut state = GeminiStreamState::default();
        let result = parse_gemini_sse_event(&mut state, "{invalid json}");
        assert!(matches!(result, Err(LLMError::Stream(_))));
    }
}
