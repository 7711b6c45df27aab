//! Transcript persistence with a degrade-and-retry quota fallback.

use super::kv::KeyValueStore;
use crate::session::{ConversationHistory, Message};
use std::sync::Arc;

/// Key under which the transcript is stored.
pub const HISTORY_STORAGE_KEY: &str = "gemini_sidecar_history";

/// Result of a save attempt. Failures are logged, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Saved only after attachment payloads were stripped.
    SavedDegraded,
    Failed,
}

#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl std::fmt::Debug for PersistenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceGateway")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, HISTORY_STORAGE_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Persist every settled message, replacing the stored value.
    ///
    /// On a quota failure the write is retried exactly once with attachment
    /// payloads blanked out.
    pub async fn save(&self, messages: &[Message]) -> SaveOutcome {
        let settled: Vec<Message> = messages
            .iter()
            .filter(|message| !message.is_thinking)
            .cloned()
            .collect();

        let payload = match serde_json::to_string(&settled) {
            Ok(payload) => payload,
            Err(error) => {
                log::error!("[{}] Failed to serialize history: {}", self.key, error);
                return SaveOutcome::Failed;
            }
        };

        let error = match self.store.set(&self.key, &payload).await {
            Ok(()) => {
                log::debug!("[{}] Saved {} messages", self.key, settled.len());
                return SaveOutcome::Saved;
            }
            Err(error) => error,
        };

        if !error.is_quota_exceeded() {
            log::error!("[{}] Failed to save history: {}", self.key, error);
            return SaveOutcome::Failed;
        }

        log::warn!(
            "[{}] Storage quota exceeded, retrying without attachment data",
            self.key
        );

        let degraded = degrade(&settled);
        let payload = match serde_json::to_string(&degraded) {
            Ok(payload) => payload,
            Err(error) => {
                log::error!("[{}] Failed to serialize degraded history: {}", self.key, error);
                return SaveOutcome::Failed;
            }
        };

        match self.store.set(&self.key, &payload).await {
            Ok(()) => {
                log::info!("[{}] Saved history without attachment data", self.key);
                SaveOutcome::SavedDegraded
            }
            Err(error) => {
                log::error!("[{}] Degraded save failed, history not persisted: {}", self.key, error);
                SaveOutcome::Failed
            }
        }
    }

    /// Load the stored transcript. Absent or unreadable values yield `None`.
    pub async fn load(&self) -> Option<ConversationHistory> {
        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                log::warn!("[{}] Failed to read stored history: {}", self.key, error);
                return None;
            }
        };

        match serde_json::from_str::<Vec<Message>>(&raw) {
            Ok(messages) => {
                let history = ConversationHistory::from_messages(messages);
                Some(ConversationHistory::from_messages(history.settled()))
            }
            Err(error) => {
                log::warn!("[{}] Ignoring unparseable stored history: {}", self.key, error);
                None
            }
        }
    }

    pub async fn clear(&self) {
        if let Err(error) = self.store.remove(&self.key).await {
            log::error!("[{}] Failed to clear stored history: {}", self.key, error);
        }
    }
}

/// Copy of `messages` with every attachment's `data` and `previewUrl` blanked.
pub fn degrade(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .cloned()
        .map(|mut message| {
            if let Some(attachments) = message.attachments.as_mut() {
                attachments.iter_mut().for_each(|attachment| attachment.strip_payload());
            }
            message
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Attachment;
    use crate::storage::{MemoryStore, StoreError};
    use std::sync::Mutex;

    /// Records every attempted write and fails according to a script.
    struct ScriptedStore {
        failures: Mutex<Vec<StoreError>>,
        attempts: Mutex<Vec<String>>,
    }

    impl ScriptedStore {
        fn failing(failures: Vec<StoreError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl KeyValueStore for ScriptedStore {
        async fn set(&self, _key: &str, value: &str) -> Result<(), StoreError> {
            self.attempts.lock().unwrap().push(value.to_string());
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                Ok(())
            } else {
                Err(failures.remove(0))
            }
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(self.attempts.lock().unwrap().last().cloned())
        }

        async fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("remove unsupported".into()))
        }
    }

    fn transcript() -> Vec<Message> {
        vec![
            Message::user("look", vec![Attachment::new("shot.png", "image/png", "QUJD")]),
            Message::model("nice"),
            Message::placeholder(),
        ]
    }

    #[tokio::test]
    async fn save_filters_thinking_messages() {
        let store = Arc::new(MemoryStore::new());
        let gateway = PersistenceGateway::new(store.clone());

        assert_eq!(gateway.save(&transcript()).await, SaveOutcome::Saved);

        let raw = store.get(HISTORY_STORAGE_KEY).await.unwrap().unwrap();
        let stored: Vec<Message> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|message| !message.is_thinking));
    }

    #[tokio::test]
    async fn quota_failure_retries_once_with_stripped_payloads() {
        let store = Arc::new(ScriptedStore::failing(vec![StoreError::QuotaExceeded(
            "full".into(),
        )]));
        let gateway = PersistenceGateway::new(store.clone());

        assert_eq!(gateway.save(&transcript()).await, SaveOutcome::SavedDegraded);

        let attempts = store.attempts();
        assert_eq!(attempts.len(), 2);

        let retried: Vec<Message> = serde_json::from_str(&attempts[1]).unwrap();
        let attachment = &retried[0].attachments()[0];
        assert_eq!(attachment.data, "");
        assert_eq!(attachment.preview_url, "");
        assert_eq!(attachment.name, "shot.png");
        assert_eq!(attachment.mime_type, "image/png");
    }

    #[tokio::test]
    async fn quota_detected_from_message_text() {
        let store = Arc::new(ScriptedStore::failing(vec![StoreError::Backend(
            "Resource::kQuotaBytes quota exceeded".into(),
        )]));
        let gateway = PersistenceGateway::new(store.clone());

        assert_eq!(gateway.save(&transcript()).await, SaveOutcome::SavedDegraded);
        assert_eq!(store.attempts().len(), 2);
    }

    #[tokio::test]
    async fn failed_retry_is_swallowed() {
        let store = Arc::new(ScriptedStore::failing(vec![
            StoreError::QuotaExceeded("full".into()),
            StoreError::QuotaExceeded("still full".into()),
        ]));
        let gateway = PersistenceGateway::new(store.clone());

        assert_eq!(gateway.save(&transcript()).await, SaveOutcome::Failed);
        assert_eq!(store.attempts().len(), 2);
    }

    #[tokio::test]
    async fn non_quota_failure_is_not_retried() {
        let store = Arc::new(ScriptedStore::failing(vec![StoreError::Backend(
            "disk unplugged".into(),
        )]));
        let gateway = PersistenceGateway::new(store.clone());

        assert_eq!(gateway.save(&transcript()).await, SaveOutcome::Failed);
        assert_eq!(store.attempts().len(), 1);
    }

    #[tokio::test]
    async fn load_handles_absent_corrupt_and_thinking() {
        let store = Arc::new(MemoryStore::new());
        let gateway = PersistenceGateway::new(store.clone());
        assert!(gateway.load().await.is_none());

        store.set(HISTORY_STORAGE_KEY, "{not json").await.unwrap();
        assert!(gateway.load().await.is_none());

        let raw = serde_json::to_string(&transcript()).unwrap();
        store.set(HISTORY_STORAGE_KEY, &raw).await.unwrap();
        let loaded = gateway.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.messages()[0].attachments()[0].data, "QUJD");
    }

    #[tokio::test]
    async fn clear_removes_key_and_swallows_errors() {
        let store = Arc::new(MemoryStore::new());
        let gateway = PersistenceGateway::new(store.clone());
        gateway.save(&transcript()).await;
        gateway.clear().await;
        assert!(gateway.load().await.is_none());

        let failing = PersistenceGateway::new(Arc::new(ScriptedStore::failing(vec![])));
        failing.clear().await;
    }
}
