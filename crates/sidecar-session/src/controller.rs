//! Streaming session controller.
//!
//! Owns the transcript and drives at most one generation turn at a time:
//! `submit` (or `quick_action`) reserves a placeholder and builds the request,
//! `drive` issues it and folds chunks into the placeholder until the stream
//! ends, fails or is cancelled. Every transcript mutation schedules a
//! debounced persistence write.

use std::sync::Arc;
use std::time::Duration;

use sidecar_core::prune::user_parts;
use sidecar_core::{
    build_outgoing_turns, calculate_context_usage, Attachment, ConversationHistory,
    HistoryPruner, Message, NoCapture, PageCapture, Part, PersistenceGateway, SaveOutcome,
    SessionError, SessionEvent, Settings, TokenUsageStats,
};
use sidecar_llm::{GenerationRequest, LLMError, LLMProvider, StreamChunk};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::machine::{StateMachine, TurnEvent, TurnState};
use crate::persistence::{PersistenceScheduler, DEFAULT_DEBOUNCE};
use crate::quick_action::{QuickAction, QUICK_ACTION_MODEL};
use crate::stream::{next_step, StreamStep};
use crate::turn::{StreamingTurn, TurnKind};

pub const STOPPED_MARKER: &str = "\n\n> 🛑 Stopped.";
pub const ERROR_PREFIX: &str = "❌ Error: ";
pub const SETTINGS_SAVED_NOTICE: &str = "✅ Settings saved.";
pub const NO_CODE_NOTICE: &str = "⚠️ No code detected";
pub const ANALYZE_PAGE_LABEL: &str = "Analyze Page";
pub const ANALYZE_PAGE_PREFIX: &str = "Analyze this page:\n\n";
/// Page text beyond this many characters is not sent.
pub const PAGE_TEXT_LIMIT: usize = 15_000;
pub const SCREENSHOT_NAME: &str = "Screenshot.png";
pub const SCREENSHOT_MIME: &str = "image/jpeg";

/// A user submission.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub prompt: String,
    /// Shown in the transcript instead of the prompt.
    pub label: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl SubmitRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Asked before sending when the context usage is critical.
pub trait ConfirmationGate {
    fn confirm(&self, usage: &TokenUsageStats) -> bool;
}

impl<F> ConfirmationGate for F
where
    F: Fn(&TokenUsageStats) -> bool,
{
    fn confirm(&self, usage: &TokenUsageStats) -> bool {
        self(usage)
    }
}

/// Gate that always proceeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl ConfirmationGate for AutoConfirm {
    fn confirm(&self, _usage: &TokenUsageStats) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Started { message_id: String },
    /// A turn is already in flight; nothing changed.
    Busy,
    /// No text and no attachments; nothing changed.
    Empty,
    /// Critical usage and the gate declined; nothing changed.
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuickActionOutcome {
    Started { message_id: String },
    Busy,
    /// No extra context and nothing captured from the page.
    NoCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzeOutcome {
    Submitted(SubmitOutcome),
    NothingToAnalyze,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed { message_id: String },
    Stopped { message_id: String },
    Failed { message_id: String, error: String },
}

impl TurnOutcome {
    pub fn message_id(&self) -> &str {
        match self {
            Self::Completed { message_id }
            | Self::Stopped { message_id }
            | Self::Failed { message_id, .. } => message_id,
        }
    }

    /// Map to the session error taxonomy. Stopping is reported as `Cancelled`.
    pub fn into_result(self) -> Result<String, SessionError> {
        match self {
            Self::Completed { message_id } => Ok(message_id),
            Self::Stopped { .. } => Err(SessionError::Cancelled),
            Self::Failed { error, .. } => Err(SessionError::Transport(error)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDisposition {
    Applied,
    /// Late, cancelled or for a turn that is no longer active.
    Discarded,
}

pub struct SessionControllerBuilder {
    settings: Settings,
    provider: Arc<dyn LLMProvider>,
    gateway: PersistenceGateway,
    capture: Arc<dyn PageCapture>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    debounce: Duration,
    session_id: Option<String>,
}

impl SessionControllerBuilder {
    pub fn capture(mut self, capture: Arc<dyn PageCapture>) -> Self {
        self.capture = capture;
        self
    }

    pub fn events(mut self, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Spawns the persistence writer, so this must run inside a Tokio runtime.
    pub fn build(mut self) -> SessionController {
        self.settings.normalize();
        let scheduler = PersistenceScheduler::spawn(self.gateway.clone(), self.debounce);
        SessionController {
            session_id: self
                .session_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            pruner: HistoryPruner::new(self.settings.auto_prune_images),
            settings: self.settings,
            history: ConversationHistory::new(),
            extra_context: String::new(),
            provider: self.provider,
            gateway: self.gateway,
            scheduler,
            capture: self.capture,
            machine: StateMachine::new(),
            turn: None,
            events: self.events,
        }
    }
}

pub struct SessionController {
    session_id: String,
    settings: Settings,
    pruner: HistoryPruner,
    history: ConversationHistory,
    extra_context: String,
    provider: Arc<dyn LLMProvider>,
    gateway: PersistenceGateway,
    scheduler: PersistenceScheduler,
    capture: Arc<dyn PageCapture>,
    machine: StateMachine,
    turn: Option<StreamingTurn>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl SessionController {
    pub fn builder(
        settings: Settings,
        provider: Arc<dyn LLMProvider>,
        gateway: PersistenceGateway,
    ) -> SessionControllerBuilder {
        SessionControllerBuilder {
            settings,
            provider,
            gateway,
            capture: Arc::new(NoCapture),
            events: None,
            debounce: DEFAULT_DEBOUNCE,
            session_id: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> &TurnState {
        self.machine.state()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.machine.state(), TurnState::Idle) && self.turn.is_none()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn extra_context(&self) -> &str {
        &self.extra_context
    }

    /// Usage of the current transcript plus extra context. Never cached.
    pub fn usage(&self) -> TokenUsageStats {
        calculate_context_usage(
            self.history.messages(),
            &self.extra_context,
            self.settings.context_limit,
        )
    }

    /// Token of the turn in flight, for stopping it from another task.
    pub fn cancel_token(&self) -> Option<CancellationToken> {
        self.turn.as_ref().map(StreamingTurn::cancel_token)
    }

    /// Start a chat turn. The request is issued by [`Self::drive`].
    pub fn submit(
        &mut self,
        request: SubmitRequest,
        gate: &dyn ConfirmationGate,
    ) -> Result<SubmitOutcome, SessionError> {
        if !self.is_idle() {
            log::debug!("[{}] Submit ignored, turn in flight", self.session_id);
            return Ok(SubmitOutcome::Busy);
        }
        let api_key = self.credential()?;

        if request.prompt.trim().is_empty() && request.attachments.is_empty() {
            return Ok(SubmitOutcome::Empty);
        }

        let usage = self.usage();
        if usage.is_critical && !gate.confirm(&usage) {
            log::info!(
                "[{}] Submit declined at {:.1}% context usage",
                self.session_id,
                usage.percentage
            );
            return Ok(SubmitOutcome::Declined);
        }

        let replay = self.pruner.prepare(&self.history);
        let prior_turns = build_outgoing_turns(replay.messages());

        let text = compose_prompt(&request.prompt, &self.extra_context);
        let text = if text.trim().is_empty() { "" } else { text.as_str() };
        let generation = GenerationRequest::new(
            api_key,
            self.settings.model,
            user_parts(&request.attachments, text),
        )
        .with_system_instruction(self.settings.system_instruction.clone())
        .with_history(prior_turns)
        .with_search(self.settings.use_search);

        let content = request
            .label
            .filter(|label| !label.trim().is_empty())
            .unwrap_or(request.prompt);
        self.history.push(Message::user(content, request.attachments));

        let message_id = self.start_turn(generation, TurnKind::Chat);
        Ok(SubmitOutcome::Started { message_id })
    }

    /// Start a single-shot action over the extra context, or code captured
    /// from the page when no context is set. Prior turns are not replayed.
    pub async fn quick_action(
        &mut self,
        action: QuickAction,
    ) -> Result<QuickActionOutcome, SessionError> {
        if !self.is_idle() {
            return Ok(QuickActionOutcome::Busy);
        }
        let api_key = self.credential()?;

        let code = if self.extra_context.trim().is_empty() {
            match non_empty(self.capture.capture_code().await) {
                Some(code) => code,
                None => return Ok(QuickActionOutcome::NoCode),
            }
        } else {
            self.extra_context.clone()
        };

        let generation = GenerationRequest::new(
            api_key,
            QUICK_ACTION_MODEL,
            vec![Part::text(action.build_prompt(&code))],
        );

        self.history.push(Message::user(action.label(), Vec::new()));
        let message_id = self.start_turn(generation, TurnKind::QuickAction);
        Ok(QuickActionOutcome::Started { message_id })
    }

    /// Submit the page text (truncated) for analysis.
    pub async fn analyze_page(
        &mut self,
        gate: &dyn ConfirmationGate,
    ) -> Result<AnalyzeOutcome, SessionError> {
        let Some(text) = non_empty(self.capture.page_text().await) else {
            return Ok(AnalyzeOutcome::NothingToAnalyze);
        };
        let truncated: String = text.chars().take(PAGE_TEXT_LIMIT).collect();

        let request = SubmitRequest::new(format!("{}{}", ANALYZE_PAGE_PREFIX, truncated))
            .with_label(ANALYZE_PAGE_LABEL);
        self.submit(request, gate).map(AnalyzeOutcome::Submitted)
    }

    /// Issue the pending request and consume its stream until the turn settles.
    ///
    /// Returns `None` when there is no turn waiting to be driven.
    pub async fn drive(&mut self) -> Option<TurnOutcome> {
        let turn = self.turn.as_mut()?;
        let request = turn.take_request()?;
        let cancel = turn.cancel_token();
        let message_id = turn.placeholder_id().to_string();

        if cancel.is_cancelled() {
            return Some(self.finish_stopped());
        }

        log::debug!(
            "[{}] Sending turn {} to {} ({} prior turns)",
            self.session_id,
            message_id,
            request.model.model_id(),
            request.history.len()
        );

        let provider = Arc::clone(&self.provider);
        let mut stream = match provider.chat_stream(&request, cancel.clone()).await {
            Ok(stream) => stream,
            Err(LLMError::Cancelled) => return Some(self.finish_stopped()),
            Err(error) if cancel.is_cancelled() => {
                log::debug!("[{}] Ignoring error after stop: {}", self.session_id, error);
                return Some(self.finish_stopped());
            }
            Err(error) => return Some(self.finish_failed(error.to_string())),
        };

        loop {
            match next_step(&mut stream, &cancel).await {
                StreamStep::Chunk(chunk) => {
                    self.apply_chunk(&message_id, chunk);
                }
                StreamStep::Finished => return Some(self.finish_completed()),
                StreamStep::Cancelled => return Some(self.finish_stopped()),
                StreamStep::Failed(error) => return Some(self.finish_failed(error.to_string())),
            }
        }
    }

    /// Fold one chunk into the placeholder `message_id`.
    pub fn apply_chunk(&mut self, message_id: &str, chunk: StreamChunk) -> ChunkDisposition {
        if !self.machine.state().is_active() {
            return ChunkDisposition::Discarded;
        }

        let (rendered, absorbed) = {
            let Some(turn) = self.turn.as_mut() else {
                return ChunkDisposition::Discarded;
            };
            if turn.placeholder_id() != message_id || turn.is_cancelled() {
                log::debug!(
                    "[{}] Discarding chunk for {} (cancelled or inactive)",
                    self.session_id,
                    message_id
                );
                return ChunkDisposition::Discarded;
            }
            let Some(placeholder) = self.history.get(message_id) else {
                log::warn!("[{}] Placeholder {} missing", self.session_id, message_id);
                return ChunkDisposition::Discarded;
            };
            let absorbed = turn.absorb(chunk);
            (turn.render(placeholder), absorbed)
        };

        self.history.replace(rendered);

        let event = if matches!(self.machine.state(), TurnState::Sending) {
            TurnEvent::StreamStarted
        } else {
            TurnEvent::ChunkReceived
        };
        self.transition(event);

        if let Some(content) = absorbed.text {
            self.emit(SessionEvent::Token {
                message_id: message_id.to_string(),
                content,
            });
        }
        if absorbed.attachments > 0 {
            self.emit(SessionEvent::AttachmentsReceived {
                message_id: message_id.to_string(),
                count: absorbed.attachments,
            });
        }

        // The placeholder is still thinking and never stored, so only re-arm
        self.scheduler.touch();
        ChunkDisposition::Applied
    }

    /// Stop the turn in flight. Returns false when there is nothing to stop.
    pub fn stop(&mut self) -> bool {
        if !self.machine.state().is_active() {
            return false;
        }
        match &self.turn {
            Some(turn) => turn.cancel(),
            None => return false,
        }
        self.finish_stopped();
        true
    }

    /// Set the extra context appended to the next prompts.
    pub fn set_extra_context(&mut self, context: impl Into<String>) {
        self.extra_context = context.into();
        self.emit_usage();
    }

    /// Capture code from the page into the extra context.
    ///
    /// Returns the captured length in characters, or `None` after appending a
    /// notice when nothing was found.
    pub async fn capture_context(&mut self) -> Option<usize> {
        match non_empty(self.capture.capture_code().await) {
            Some(code) => {
                let length = code.chars().count();
                log::info!("[{}] Captured {} chars of context", self.session_id, length);
                self.set_extra_context(code);
                Some(length)
            }
            None => {
                self.notice(NO_CODE_NOTICE);
                None
            }
        }
    }

    /// Screenshot of the page as an attachment for the next submit.
    pub async fn capture_screenshot(&self) -> Option<Attachment> {
        let data_url = self.capture.screenshot().await?;
        let attachment = Attachment::from_data_url(SCREENSHOT_NAME, &data_url, Some(SCREENSHOT_MIME));
        if attachment.is_none() {
            log::warn!("[{}] Screenshot was not a data URL", self.session_id);
        }
        attachment
    }

    /// Remove the stored transcript and reset the session. Only while idle.
    pub async fn clear_chat(&mut self) -> bool {
        if !self.is_idle() {
            return false;
        }
        self.scheduler.clear().await;
        self.history.clear();
        self.extra_context.clear();
        log::info!("[{}] History cleared", self.session_id);
        self.emit_usage();
        true
    }

    /// Strip every attachment from the transcript. Only while idle.
    pub fn optimize_history(&mut self) -> usize {
        if !self.is_idle() {
            return 0;
        }
        let removed = HistoryPruner::strip_all(&mut self.history);
        if removed > 0 {
            log::info!("[{}] Removed {} attachments", self.session_id, removed);
            self.persist();
            self.emit_usage();
        }
        removed
    }

    /// Apply new settings from the next turn on.
    pub fn update_settings(&mut self, mut settings: Settings) {
        settings.normalize();
        self.pruner.set_enabled(settings.auto_prune_images);
        self.settings = settings;
        self.notice(SETTINGS_SAVED_NOTICE);
    }

    /// Replace the transcript with the stored one, if any. Only while idle.
    pub async fn restore(&mut self) -> usize {
        if !self.is_idle() {
            return 0;
        }
        if let Some(history) = self.gateway.load().await {
            log::info!("[{}] Restored {} messages", self.session_id, history.len());
            self.history = history;
            self.emit_usage();
        }
        self.history.len()
    }

    /// Write any pending snapshot now.
    pub async fn flush(&self) -> Option<SaveOutcome> {
        self.scheduler.flush().await
    }

    /// Flush pending writes and stop the writer task.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
    }

    fn credential(&self) -> Result<String, SessionError> {
        match self.settings.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => Err(SessionError::Configuration(
                "Gemini API key is not configured".to_string(),
            )),
        }
    }

    fn start_turn(&mut self, request: GenerationRequest, kind: TurnKind) -> String {
        let placeholder = Message::placeholder();
        let message_id = placeholder.id.clone();
        self.history.push(placeholder);
        self.turn = Some(StreamingTurn::new(message_id.clone(), request, kind));
        self.transition(TurnEvent::Submitted);

        log::info!("[{}] Turn {} started ({:?})", self.session_id, message_id, kind);
        self.emit(SessionEvent::TurnStarted {
            message_id: message_id.clone(),
        });
        self.emit_usage();
        self.persist();
        message_id
    }

    fn finish_completed(&mut self) -> TurnOutcome {
        let message_id = self.settle(TurnEvent::StreamEnded, None);
        log::info!("[{}] Turn {} completed", self.session_id, message_id);
        self.emit(SessionEvent::TurnCompleted {
            message_id: message_id.clone(),
        });
        self.emit_usage();
        TurnOutcome::Completed { message_id }
    }

    fn finish_stopped(&mut self) -> TurnOutcome {
        let message_id = self.settle(TurnEvent::Stopped, Some(STOPPED_MARKER));
        log::info!("[{}] Turn {} stopped", self.session_id, message_id);
        self.emit(SessionEvent::TurnStopped {
            message_id: message_id.clone(),
        });
        self.emit_usage();
        TurnOutcome::Stopped { message_id }
    }

    fn finish_failed(&mut self, error: String) -> TurnOutcome {
        log::error!("[{}] Turn failed: {}", self.session_id, error);
        let message_id = self.settle(
            TurnEvent::TransportFailed {
                error: error.clone(),
            },
            None,
        );
        self.emit(SessionEvent::TurnFailed {
            message_id: message_id.clone(),
            error: error.clone(),
        });
        self.notice(&format!("{}{}", ERROR_PREFIX, error));
        TurnOutcome::Failed { message_id, error }
    }

    /// Finalize the placeholder, record the outcome and return to Idle.
    fn settle(&mut self, event: TurnEvent, marker: Option<&str>) -> String {
        let message_id = match self.turn.take() {
            Some(turn) => {
                turn.cancel();
                turn.placeholder_id().to_string()
            }
            None => String::new(),
        };

        if let Some(mut placeholder) = self.history.get(&message_id).cloned() {
            placeholder.is_thinking = false;
            if let Some(marker) = marker {
                placeholder.content.push_str(marker);
            }
            self.history.replace(placeholder);
        }

        self.transition(event);
        self.transition(TurnEvent::Settled);
        self.persist();
        message_id
    }

    fn notice(&mut self, content: &str) {
        self.history.push(Message::system(content));
        self.emit(SessionEvent::Notice {
            content: content.to_string(),
        });
        self.persist();
    }

    fn transition(&mut self, event: TurnEvent) {
        if let Err(error) = self.machine.handle_event(event) {
            log::warn!("[{}] {}", self.session_id, error);
        }
    }

    fn persist(&self) {
        self.scheduler.schedule(self.history.messages().to_vec());
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn emit_usage(&self) {
        self.emit(SessionEvent::UsageUpdated {
            usage: self.usage(),
        });
    }
}

/// Append the extra context as a fenced technical context block.
pub fn compose_prompt(prompt: &str, extra_context: &str) -> String {
    if extra_context.is_empty() {
        prompt.to_string()
    } else {
        format!(
            "{}\n\nTECHNICAL CONTEXT:\n```\n{}\n```",
            prompt, extra_context
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
