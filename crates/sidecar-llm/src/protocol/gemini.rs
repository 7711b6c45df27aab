//! Google Gemini protocol conversion implementation.
//!
//! Gemini API has a unique format:
//! - Messages are called "contents"
//! - Role is "user" or "model"
//! - Content is an array of "parts" (text or base64 `inlineData`)
//! - System instructions are separate from messages
//!
//! # Example Gemini Request
//! ```json
//! {
//!   "contents": [
//!     { "role": "user", "parts": [{"inlineData": {"mimeType": "image/png", "data": "..."}}, {"text": "Hello"}] }
//!   ],
//!   "systemInstruction": { "parts": [{"text": "You are helpful"}] },
//!   "tools": [{"googleSearch": {}}],
//!   "generationConfig": { "thinkingConfig": { "thinkingBudget": 1024 } }
//! }
//! ```

use crate::protocol::{FromProvider, ProtocolError, ProtocolResult, ToProvider};
use crate::provider::GenerationRequest;
use crate::types::StreamChunk;
use serde::{Deserialize, Serialize};
use sidecar_core::{Attachment, GroundingMetadata, Part, Turn, TurnRole};

// ============================================================================
// Gemini API Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeminiContent {
    /// "user" or "model"; absent on system instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<GeminiInlineData>,
    /// Set on reasoning summaries, which are not part of the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiTool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_search: Option<GoogleSearch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<GeminiThinkingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiThinkingConfig {
    pub thinking_budget: u32,
}

/// One `streamGenerateContent` SSE payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiStreamResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<GeminiError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<GeminiContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

// ============================================================================
// Internal → Gemini (ToProvider)
// ============================================================================

fn role_name(role: TurnRole) -> &'static str {
    match role {
        TurnRole::User => "user",
        TurnRole::Model => "model",
    }
}

impl ToProvider<GeminiPart> for Part {
    fn to_provider(&self) -> ProtocolResult<GeminiPart> {
        Ok(match self {
            Part::Text { text } => GeminiPart {
                text: Some(text.clone()),
                ..GeminiPart::default()
            },
            Part::InlineData { mime_type, data } => {
                if mime_type.is_empty() || data.is_empty() {
                    return Err(ProtocolError::InvalidContent(
                        "inline data requires a mime type and payload".to_string(),
                    ));
                }
                GeminiPart {
                    inline_data: Some(GeminiInlineData {
                        mime_type: mime_type.clone(),
                        data: data.clone(),
                    }),
                    ..GeminiPart::default()
                }
            }
        })
    }
}

impl ToProvider<GeminiContent> for Turn {
    fn to_provider(&self) -> ProtocolResult<GeminiContent> {
        Ok(GeminiContent {
            role: Some(role_name(self.role).to_string()),
            parts: self
                .parts
                .iter()
                .map(|part| part.to_provider())
                .collect::<ProtocolResult<Vec<_>>>()?,
        })
    }
}

impl ToProvider<GeminiRequest> for GenerationRequest {
    fn to_provider(&self) -> ProtocolResult<GeminiRequest> {
        if self.message.is_empty() {
            return Err(ProtocolError::InvalidContent(
                "new turn has no parts".to_string(),
            ));
        }

        let mut contents = self
            .history
            .iter()
            .map(|turn| turn.to_provider())
            .collect::<ProtocolResult<Vec<GeminiContent>>>()?;
        contents.push(Turn::new(TurnRole::User, self.message.clone()).to_provider()?);

        let system_instruction = self.system_instruction.as_ref().map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(text.clone()),
                ..GeminiPart::default()
            }],
        });

        let tools = self.search_enabled().then(|| {
            vec![GeminiTool {
                google_search: Some(GoogleSearch {}),
            }]
        });

        let generation_config = self.model.thinking_budget().map(|budget| GeminiGenerationConfig {
            thinking_config: Some(GeminiThinkingConfig {
                thinking_budget: budget,
            }),
        });

        Ok(GeminiRequest {
            contents,
            system_instruction,
            tools,
            generation_config,
        })
    }
}

// ============================================================================
// Gemini → Internal (FromProvider)
// ============================================================================

impl FromProvider<GeminiInlineData> for Attachment {
    fn from_provider(inline: GeminiInlineData) -> ProtocolResult<Self> {
        if inline.data.is_empty() {
            return Err(ProtocolError::InvalidStreamChunk(
                "inline data without payload".to_string(),
            ));
        }
        Ok(Attachment::new("generated-image", inline.mime_type, inline.data))
    }
}

impl FromProvider<GeminiStreamResponse> for StreamChunk {
    /// Text of all non-thought parts is concatenated; inline data becomes
    /// attachments. Only the first candidate is read.
    fn from_provider(response: GeminiStreamResponse) -> ProtocolResult<Self> {
        let Some(candidate) = response.candidates.into_iter().next() else {
            return Ok(StreamChunk::default());
        };

        let mut text = String::new();
        let mut attachments = Vec::new();

        for part in candidate.content.map(|content| content.parts).unwrap_or_default() {
            if part.thought == Some(true) {
                continue;
            }
            if let Some(part_text) = part.text {
                text.push_str(&part_text);
            }
            if let Some(inline) = part.inline_data {
                attachments.push(Attachment::from_provider(inline)?);
            }
        }

        Ok(StreamChunk {
            text: (!text.is_empty()).then_some(text),
            attachments,
            grounding_metadata: candidate.grounding_metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidecar_core::ModelType;
    use serde_json::json;

    fn request(model: ModelType) -> GenerationRequest {
        GenerationRequest::new("key", model, vec![Part::inline_data("image/png", "QUJD"), Part::text("hi")])
            .with_system_instruction("Be brief")
            .with_history(vec![
                Turn::new(TurnRole::User, vec![Part::text("earlier")]),
                Turn::new(TurnRole::Model, vec![Part::text("reply")]),
            ])
            .with_search(true)
    }

    #[test]
    fn smart_request_serializes_search_and_thinking() {
        let gemini: GeminiRequest = request(ModelType::Smart).to_provider().unwrap();
        let value = serde_json::to_value(&gemini).unwrap();

        assert_eq!(
            value,
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "earlier"}]},
                    {"role": "model", "parts": [{"text": "reply"}]},
                    {"role": "user", "parts": [
                        {"inlineData": {"mimeType": "image/png", "data": "QUJD"}},
                        {"text": "hi"}
                    ]}
                ],
                "systemInstruction": {"parts": [{"text": "Be brief"}]},
                "tools": [{"googleSearch": {}}],
                "generationConfig": {"thinkingConfig": {"thinkingBudget": 1024}}
            })
        );
    }

    #[test]
    fn fast_request_omits_search_and_thinking() {
        let gemini: GeminiRequest = request(ModelType::Fast).to_provider().unwrap();
        assert!(gemini.tools.is_none());
        assert!(gemini.generation_config.is_none());
        assert_eq!(gemini.contents.len(), 3);
    }

    #[test]
    fn empty_new_turn_is_rejected() {
        let empty = GenerationRequest::new("key", ModelType::Fast, vec![]);
        let result: ProtocolResult<GeminiRequest> = empty.to_provider();
        assert!(matches!(result, Err(ProtocolError::InvalidContent(_))));
    }

    #[test]
    fn stripped_inline_data_is_rejected() {
        let result: ProtocolResult<GeminiPart> = Part::inline_data("image/png", "").to_provider();
        assert!(result.is_err());
    }

    #[test]
    fn response_skips_thought_parts_and_collects_images() {
        let response: GeminiStreamResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Here "},
                    {"text": "it is"},
                    {"inlineData": {"mimeType": "image/png", "data": "UE5H"}}
                ]},
                "groundingMetadata": {"webSearchQueries": ["rust"]}
            }]
        }))
        .unwrap();

        let chunk = StreamChunk::from_provider(response).unwrap();
        assert_eq!(chunk.text.as_deref(), Some("Here it is"));
        assert_eq!(chunk.attachments.len(), 1);
        assert_eq!(chunk.attachments[0].preview_url, "data:image/png;base64,UE5H");
        assert_eq!(
            chunk.grounding_metadata.unwrap().web_search_queries,
            Some(vec!["rust".to_string()])
        );
    }

    #[test]
    fn response_without_candidates_is_empty() {
        let chunk = StreamChunk::from_provider(GeminiStreamResponse::default()).unwrap();
        assert!(chunk.is_empty());
    }
}
