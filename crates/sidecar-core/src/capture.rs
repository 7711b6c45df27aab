//! Host page capture collaborator.
//!
//! Implementations read code, page text or a screenshot from wherever the
//! session is embedded. `None` means nothing was available; failures are
//! reported the same way.

#[async_trait::async_trait]
pub trait PageCapture: Send + Sync {
    /// Code currently selected or visible on the page.
    async fn capture_code(&self) -> Option<String>;

    /// Readable text content of the page.
    async fn page_text(&self) -> Option<String>;

    /// Screenshot as a `data:` URL.
    async fn screenshot(&self) -> Option<String>;
}

/// Capture source with nothing to offer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapture;

#[async_trait::async_trait]
impl PageCapture for NoCapture {
    async fn capture_code(&self) -> Option<String> {
        None
    }

    async fn page_text(&self) -> Option<String> {
        None
    }

    async fn screenshot(&self) -> Option<String> {
        None
    }
}
