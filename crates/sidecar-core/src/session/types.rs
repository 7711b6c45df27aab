use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    System,
}

/// Binary payload attached to a message (user upload, screenshot or generated image).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default = "generate_id")]
    pub id: String,
    pub mime_type: String,
    /// Base64 encoded payload, empty once stripped by the quota fallback.
    #[serde(default)]
    pub data: String,
    /// Renderable representation (data URL), empty once stripped.
    #[serde(default)]
    pub preview_url: String,
    #[serde(default)]
    pub name: String,
}

impl Attachment {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        let data = data.into();
        let preview_url = format!("data:{};base64,{}", mime_type, data);
        Self {
            id: generate_id(),
            mime_type,
            data,
            preview_url,
            name: name.into(),
        }
    }

    /// Build an attachment from a `data:<mime>;base64,<payload>` URL.
    ///
    /// The declared mime type is used unless `mime_override` is given.
    pub fn from_data_url(
        name: impl Into<String>,
        data_url: &str,
        mime_override: Option<&str>,
    ) -> Option<Self> {
        let rest = data_url.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        if payload.is_empty() {
            return None;
        }
        let declared = header.split(';').next().unwrap_or_default();
        let mime_type = mime_override.unwrap_or(declared);
        if mime_type.is_empty() {
            return None;
        }

        Some(Self {
            id: generate_id(),
            mime_type: mime_type.to_string(),
            data: payload.to_string(),
            preview_url: data_url.to_string(),
            name: name.into(),
        })
    }

    /// Drop the binary payload while keeping id, name and mime type.
    pub fn strip_payload(&mut self) {
        self.data.clear();
        self.preview_url.clear();
    }

    pub fn has_payload(&self) -> bool {
        !self.data.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search_queries: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_entry_point: Option<SearchEntryPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_chunks: Option<Vec<GroundingChunk>>,
}

impl GroundingMetadata {
    /// Web sources that carry a URI, in citation order.
    pub fn web_sources(&self) -> impl Iterator<Item = &WebSource> {
        self.grounding_chunks
            .iter()
            .flatten()
            .filter_map(|chunk| chunk.web.as_ref())
            .filter(|web| !web.uri.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntryPoint {
    #[serde(default)]
    pub rendered_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroundingChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebSource {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default = "generate_id")]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Set only while a model message is still receiving chunks.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_thinking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_metadata: Option<GroundingMetadata>,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Message {
    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            id: generate_id(),
            role: Role::User,
            content: content.into(),
            is_thinking: false,
            attachments: if attachments.is_empty() {
                None
            } else {
                Some(attachments)
            },
            grounding_metadata: None,
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            role: Role::Model,
            content: content.into(),
            is_thinking: false,
            attachments: None,
            grounding_metadata: None,
        }
    }

    /// Empty model message reserved at turn start and filled as chunks arrive.
    pub fn placeholder() -> Self {
        Self {
            is_thinking: true,
            ..Self::model(String::new())
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            role: Role::System,
            content: content.into(),
            is_thinking: false,
            attachments: None,
            grounding_metadata: None,
        }
    }

    pub fn attachments(&self) -> &[Attachment] {
        self.attachments.as_deref().unwrap_or_default()
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments().len()
    }

    /// Remove every attachment, keeping the field present when it was present.
    pub fn clear_attachments(&mut self) -> usize {
        match self.attachments.as_mut() {
            Some(attachments) => {
                let removed = attachments.len();
                attachments.clear();
                removed
            }
            None => 0,
        }
    }
}

/// Ordered transcript owned by one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replace the message with the same id in place. Returns false if no message matched.
    pub fn replace(&mut self, message: Message) -> bool {
        match self.messages.iter_mut().find(|existing| existing.id == message.id) {
            Some(slot) => {
                *slot = message;
                true
            }
            None => false,
        }
    }

    /// Strip attachments from every message, returning how many were removed.
    pub fn clear_all_attachments(&mut self) -> usize {
        self.messages
            .iter_mut()
            .map(Message::clear_attachments)
            .sum()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Messages that are no longer receiving chunks.
    pub fn settled(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|message| !message.is_thinking)
            .cloned()
            .collect()
    }

    pub fn attachment_count(&self) -> usize {
        self.messages.iter().map(Message::attachment_count).sum()
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
