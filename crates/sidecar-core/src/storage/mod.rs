//! Durable transcript storage.
//!
//! - [`kv`]: the `KeyValueStore` trait and its error type
//! - [`file`]: one JSON file per key with a byte quota
//! - [`memory`]: in-process map, used by tests and ephemeral sessions
//! - [`gateway`]: transcript save/load/clear with the quota fallback

pub mod file;
pub mod gateway;
pub mod kv;
pub mod memory;

pub use file::{FileStore, DEFAULT_QUOTA_BYTES};
pub use gateway::{degrade, PersistenceGateway, SaveOutcome, HISTORY_STORAGE_KEY};
pub use kv::{KeyValueStore, StoreError};
pub use memory::MemoryStore;
