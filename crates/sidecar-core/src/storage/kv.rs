use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Backends do not always report quota failures with a dedicated kind,
    /// so a message mentioning "quota" counts too.
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            Self::QuotaExceeded(_) => true,
            other => other.to_string().to_lowercase().contains("quota"),
        }
    }
}

/// String-valued store where a write fully replaces the value under its key.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_detection_matches_variant_and_message() {
        assert!(StoreError::QuotaExceeded("full".into()).is_quota_exceeded());
        assert!(StoreError::Backend("QUOTA_BYTES quota exceeded".into()).is_quota_exceeded());
        assert!(!StoreError::Backend("disk unplugged".into()).is_quota_exceeded());
        assert!(!StoreError::Io(std::io::Error::other("denied")).is_quota_exceeded());
    }
}
