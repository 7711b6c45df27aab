//! Debounced transcript writes.
//!
//! A dedicated writer task owns the debounce timer. Every snapshot replaces
//! the pending one and re-arms the timer, so a burst of mutations produces a
//! single write carrying the last snapshot, once the window has elapsed since
//! the final mutation. A touch re-arms the timer without carrying a
//! snapshot, for mutations that do not change what would be written.

use std::time::Duration;

use sidecar_core::{Message, PersistenceGateway, SaveOutcome};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Quiescence window before a snapshot is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

enum WriteCommand {
    Snapshot(Vec<Message>),
    Touch,
    Flush(oneshot::Sender<Option<SaveOutcome>>),
    Clear(oneshot::Sender<()>),
}

pub struct PersistenceScheduler {
    tx: mpsc::UnboundedSender<WriteCommand>,
    handle: JoinHandle<()>,
}

impl PersistenceScheduler {
    /// Spawn the writer task. Must be called within a Tokio runtime.
    pub fn spawn(gateway: PersistenceGateway, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(gateway, debounce, rx));
        Self { tx, handle }
    }

    /// Queue a snapshot, re-arming the debounce timer.
    pub fn schedule(&self, snapshot: Vec<Message>) {
        if self.tx.send(WriteCommand::Snapshot(snapshot)).is_err() {
            log::warn!("Persistence writer stopped, snapshot dropped");
        }
    }

    /// Re-arm the debounce timer of the pending snapshot, if any.
    pub fn touch(&self) {
        if self.tx.send(WriteCommand::Touch).is_err() {
            log::warn!("Persistence writer stopped");
        }
    }

    /// Write any pending snapshot now. Returns `None` when nothing was pending.
    pub async fn flush(&self) -> Option<SaveOutcome> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriteCommand::Flush(ack_tx)).is_err() {
            return None;
        }
        ack_rx.await.ok().flatten()
    }

    /// Drop any pending snapshot and remove the stored transcript.
    pub async fn clear(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriteCommand::Clear(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Flush and stop the writer task.
    pub async fn shutdown(self) {
        let Self { tx, handle } = self;
        drop(tx);
        if let Err(error) = handle.await {
            log::error!("Persistence writer panicked: {}", error);
        }
    }
}

async fn run_writer(
    gateway: PersistenceGateway,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<WriteCommand>,
) {
    let sleep = tokio::time::sleep(debounce);
    tokio::pin!(sleep);
    let mut pending: Option<Vec<Message>> = None;

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(WriteCommand::Snapshot(snapshot)) => {
                    pending = Some(snapshot);
                    sleep.as_mut().reset(Instant::now() + debounce);
                }
                Some(WriteCommand::Touch) => {
                    if pending.is_some() {
                        sleep.as_mut().reset(Instant::now() + debounce);
                    }
                }
                Some(WriteCommand::Flush(ack)) => {
                    let outcome = match pending.take() {
                        Some(snapshot) => Some(gateway.save(&snapshot).await),
                        None => None,
                    };
                    let _ = ack.send(outcome);
                }
                Some(WriteCommand::Clear(ack)) => {
                    pending = None;
                    gateway.clear().await;
                    let _ = ack.send(());
                }
                None => {
                    if let Some(snapshot) = pending.take() {
                        gateway.save(&snapshot).await;
                    }
                    log::debug!("[{}] Persistence writer stopped", gateway.key());
                    break;
                }
            },
            _ = &mut sleep, if pending.is_some() => {
                if let Some(snapshot) = pending.take() {
                    gateway.save(&snapshot).await;
                }
            }
        }
    }
}
