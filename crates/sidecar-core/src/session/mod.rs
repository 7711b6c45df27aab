pub mod error;
pub mod events;
pub mod types;
pub mod wire;

pub use error::SessionError;
pub use events::SessionEvent;
pub use types::{
    Attachment, ConversationHistory, GroundingChunk, GroundingMetadata, Message, Role,
    SearchEntryPoint, WebSource,
};
pub use wire::{Part, Turn, TurnRole};
