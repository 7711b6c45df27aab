//! Error types for protocol conversion.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid content format: {0}")]
    InvalidContent(String),

    #[error("Invalid stream chunk: {0}")]
    InvalidStreamChunk(String),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
