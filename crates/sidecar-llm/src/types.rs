use sidecar_core::{Attachment, GroundingMetadata};

/// One increment of a streamed generation.
///
/// Any combination of fields may be present; a chunk with none of them is
/// never emitted by the providers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_grounding(mut self, metadata: GroundingMetadata) -> Self {
        self.grounding_metadata = Some(metadata);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, str::is_empty)
            && self.attachments.is_empty()
            && self.grounding_metadata.is_none()
    }
}
