//! Clipboard-backed page capture.
//!
//! In a terminal there is no host page, so code and page text are read from
//! the system clipboard. Screenshots are not available.

use arboard::Clipboard;
use async_trait::async_trait;
use sidecar_core::PageCapture;

#[derive(Debug, Clone, Copy, Default)]
pub struct ClipboardCapture;

impl ClipboardCapture {
    fn read_text() -> Option<String> {
        let mut clipboard = match Clipboard::new() {
            Ok(clipboard) => clipboard,
            Err(error) => {
                log::warn!("Clipboard unavailable: {}", error);
                return None;
            }
        };
        match clipboard.get_text() {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(error) => {
                log::debug!("Clipboard has no text: {}", error);
                None
            }
        }
    }
}

#[async_trait]
impl PageCapture for ClipboardCapture {
    async fn capture_code(&self) -> Option<String> {
        tokio::task::spawn_blocking(Self::read_text)
            .await
            .ok()
            .flatten()
    }

    async fn page_text(&self) -> Option<String> {
        self.capture_code().await
    }

    async fn screenshot(&self) -> Option<String> {
        None
    }
}
