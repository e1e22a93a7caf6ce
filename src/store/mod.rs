//! Failure-tolerant persistent key-value storage.
//!
//! Two layers:
//! - [`StorageBackend`]: raw string slots (SQLite, in-memory, or disabled)
//! - [`PersistentStore`]: JSON values on top of a backend, never erroring
//!
//! Every consumer (response cache, preferences, history) goes through a
//! `PersistentStore`, so a broken or missing backend degrades to defaults
//! instead of failing the command.

mod backend;
mod keys;
mod persistent;

pub use backend::{MemoryBackend, SqliteBackend, StorageBackend, UnavailableBackend};
pub use keys::StorageKey;
pub use persistent::PersistentStore;
