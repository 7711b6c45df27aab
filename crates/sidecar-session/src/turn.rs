use sidecar_core::{Attachment, GroundingMetadata, Message};
use sidecar_llm::{GenerationRequest, StreamChunk};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    Chat,
    QuickAction,
}

/// What a chunk contributed to the turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbsorbedChunk {
    pub text: Option<String>,
    pub attachments: usize,
}

/// Accumulators for the one turn in flight.
///
/// Exists only while the controller is not idle. The placeholder message in
/// the transcript is always re-rendered from these buffers.
#[derive(Debug)]
pub struct StreamingTurn {
    placeholder_id: String,
    text: String,
    attachments: Vec<Attachment>,
    grounding_metadata: Option<GroundingMetadata>,
    cancel: CancellationToken,
    request: Option<GenerationRequest>,
    kind: TurnKind,
}

impl StreamingTurn {
    pub fn new(placeholder_id: impl Into<String>, request: GenerationRequest, kind: TurnKind) -> Self {
        Self {
            placeholder_id: placeholder_id.into(),
            text: String::new(),
            attachments: Vec::new(),
            grounding_metadata: None,
            cancel: CancellationToken::new(),
            request: Some(request),
            kind,
        }
    }

    pub fn placeholder_id(&self) -> &str {
        &self.placeholder_id
    }

    pub fn kind(&self) -> TurnKind {
        self.kind
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The request is issued at most once.
    pub fn take_request(&mut self) -> Option<GenerationRequest> {
        self.request.take()
    }

    /// Fold a chunk into the buffers. Attachments are concatenated, grounding
    /// metadata is replaced by the latest one seen.
    pub fn absorb(&mut self, chunk: StreamChunk) -> AbsorbedChunk {
        let text = chunk.text.filter(|text| !text.is_empty());
        if let Some(text) = &text {
            self.text.push_str(text);
        }

        let attachments = chunk.attachments.len();
        self.attachments.extend(chunk.attachments);

        if chunk.grounding_metadata.is_some() {
            self.grounding_metadata = chunk.grounding_metadata;
        }

        AbsorbedChunk { text, attachments }
    }

    /// Placeholder message reflecting the current buffers.
    pub fn render(&self, placeholder: &Message) -> Message {
        Message {
            content: self.text.clone(),
            is_thinking: true,
            attachments: if self.attachments.is_empty() {
                None
            } else {
                Some(self.attachments.clone())
            },
            grounding_metadata: self.grounding_metadata.clone(),
            ..placeholder.clone()
        }
    }
}
