use super::kv::{KeyValueStore, StoreError};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Quota matching the browser extension local storage area (5 MiB).
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

/// Stores each key as `<key>.json` under a base directory.
///
/// The quota applies to the total size of all keys. Writes go to a temporary
/// file first and are renamed into place, so a failed write never leaves a
/// truncated value behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
    quota_bytes: Option<u64>,
}

impl FileStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            quota_bytes: Some(DEFAULT_QUOTA_BYTES),
        }
    }

    /// Replace the quota. `None` disables it.
    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub async fn init(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.base_path).await
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Total bytes currently stored, excluding `skip_key`.
    async fn used_bytes(&self, skip_key: &str) -> std::io::Result<u64> {
        let skip = self.key_path(skip_key);
        let mut total = 0u64;

        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(error) => return Err(error),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path == skip || path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            total += entry.metadata().await?.len();
        }

        Ok(total)
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_path.join(format!("{}.json", sanitized))
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(quota) = self.quota_bytes {
            let used = self.used_bytes(key).await?;
            let needed = used + value.len() as u64;
            if needed > quota {
                log::debug!(
                    "[{}] write of {} bytes rejected ({} of {} bytes in use)",
                    key,
                    value.len(),
                    used,
                    quota
                );
                return Err(StoreError::QuotaExceeded(format!(
                    "QUOTA_BYTES quota exceeded ({} > {} bytes)",
                    needed, quota
                )));
            }
        }

        fs::create_dir_all(&self.base_path).await?;
        let path = self.key_path(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, value).await?;
        fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.key_path(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_temp_store(quota: Option<u64>) -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).with_quota(quota);
        store.init().await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn set_get_remove_round_trip() {
        let (store, _dir) = create_temp_store(None).await;

        assert_eq!(store.get("history").await.unwrap(), None);
        store.set("history", "[1]").await.unwrap();
        store.set("history", "[1,2]").await.unwrap();
        assert_eq!(store.get("history").await.unwrap().as_deref(), Some("[1,2]"));

        store.remove("history").await.unwrap();
        assert_eq!(store.get("history").await.unwrap(), None);
        // Removing a missing key is not an error
        store.remove("history").await.unwrap();
    }

    #[tokio::test]
    async fn quota_rejects_oversized_write_and_keeps_old_value() {
        let (store, _dir) = create_temp_store(Some(10)).await;

        store.set("k", "12345").await.unwrap();
        let error = store.set("k", "12345678901").await.unwrap_err();
        assert!(error.is_quota_exceeded());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("12345"));

        // Replacing a key does not count its previous size
        store.set("k", "1234567890").await.unwrap();
    }

    #[tokio::test]
    async fn quota_counts_other_keys() {
        let (store, _dir) = create_temp_store(Some(10)).await;

        store.set("a", "123456").await.unwrap();
        assert!(store.set("b", "123456").await.unwrap_err().is_quota_exceeded());
        store.set("b", "1234").await.unwrap();
    }

    #[tokio::test]
    async fn keys_are_sanitized_into_file_names() {
        let (store, dir) = create_temp_store(None).await;
        store.set("../escape/key", "x").await.unwrap();
        assert!(dir.path().join("___escape_key.json").exists());
        assert_eq!(store.get("../escape/key").await.unwrap().as_deref(), Some("x"));
    }
}
