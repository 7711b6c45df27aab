//! sidecar-llm - Generation transport for the Gemini sidecar
//!
//! - `provider` - the `LLMProvider` trait, request and error types
//! - `protocol` - Gemini wire types and conversions
//! - `providers` - the Gemini streaming provider and the SSE adapter

pub mod protocol;
pub mod provider;
pub mod providers;
pub mod types;

pub use provider::{GenerationRequest, LLMError, LLMProvider, LLMStream};
pub use providers::GeminiProvider;
pub use types::StreamChunk;
