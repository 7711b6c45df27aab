//! Scripted collaborators for controller tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use sidecar_core::PageCapture;
use sidecar_llm::provider::Result;
use sidecar_llm::{GenerationRequest, LLMError, LLMProvider, LLMStream, StreamChunk};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

pub enum Script {
    Chunks(Vec<Result<StreamChunk>>),
    Channel(mpsc::UnboundedReceiver<Result<StreamChunk>>),
    Fail(LLMError),
}

#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(texts: &[&str]) -> Self {
        Self::new(vec![Script::Chunks(
            texts.iter().map(|text| Ok(StreamChunk::text(*text))).collect(),
        )])
    }

    /// Provider whose stream stays open until the returned sender sends or drops.
    pub fn channel() -> (Self, mpsc::UnboundedSender<Result<StreamChunk>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(vec![Script::Channel(rx)]), tx)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat_stream(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<LLMStream> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Chunks(Vec::new()));

        let stream: LLMStream = match script {
            Script::Chunks(items) => Box::pin(stream::iter(items)),
            Script::Channel(rx) => Box::pin(UnboundedReceiverStream::new(rx)),
            Script::Fail(error) => return Err(error),
        };
        Ok(Box::pin(stream.take_until(cancel.cancelled_owned())))
    }
}

#[derive(Default)]
pub struct ScriptedCapture {
    pub code: Option<String>,
    pub page_text: Option<String>,
    pub screenshot: Option<String>,
}

#[async_trait]
impl PageCapture for ScriptedCapture {
    async fn capture_code(&self) -> Option<String> {
        self.code.clone()
    }

    async fn page_text(&self) -> Option<String> {
        self.page_text.clone()
    }

    async fn screenshot(&self) -> Option<String> {
        self.screenshot.clone()
    }
}
