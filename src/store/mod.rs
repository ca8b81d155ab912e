//! Persistent key/value snapshot storage.
//!
//! The cache layer never talks to the filesystem directly; it goes through
//! the [`SnapshotStore`] trait so call sites can inject a file-backed store
//! in the application and an in-memory store in tests.
//!
//! Values are opaque strings. Whatever structure they carry (the cache's
//! entry envelope, acknowledgement lists) is the caller's concern; the
//! store only promises that a value read back is the value last written.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store lock poisoned: {0}")]
    Poisoned(String),
}

/// String-keyed, string-valued persistent store.
///
/// Implementations must support interleaved reads and writes from multiple
/// threads; each `set` replaces the whole value for a key.
pub trait SnapshotStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All keys currently present, in no particular order.
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}
