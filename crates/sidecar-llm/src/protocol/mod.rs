//! Protocol conversion traits and types.
//!
//! Provider wire types convert to and from the provider-neutral types in
//! `sidecar_core` (turns, parts, attachments) and [`crate::StreamChunk`].

mod errors;
pub mod gemini;

pub use errors::{ProtocolError, ProtocolResult};

/// Convert a provider-specific value into an internal type.
pub trait FromProvider<T>: Sized {
    fn from_provider(value: T) -> ProtocolResult<Self>;
}

/// Convert an internal value into a provider-specific type.
pub trait ToProvider<T>: Sized {
    fn to_provider(&self) -> ProtocolResult<T>;
}
