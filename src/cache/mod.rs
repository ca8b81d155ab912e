//! Snapshot caching with explicit freshness windows and stale fallback.
//!
//! Every remote read in the crate goes through this layer. The contract:
//! serve the stored snapshot while it is inside its freshness window;
//! otherwise fetch from the network and overwrite the snapshot; if the
//! network fails and any decodable snapshot exists, serve it regardless of
//! age rather than failing the caller.
//!
//! The cache is an optimization, not a source of truth: a corrupt or
//! unreadable snapshot always reads as "no entry" and heals itself on the
//! next successful fetch.

pub mod envelope;
pub mod freshness;
pub mod key;
pub mod orchestrator;
pub mod registry;

pub use envelope::CacheEntry;
pub use freshness::{age_display, is_fresh};
pub use key::CacheKey;
pub use orchestrator::{FetchSource, Fetched, SnapshotCache};
pub use registry::{CachePolicy, CacheRegistry, CacheStatsReport};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Contract violation when constructing a key. Never retried.
    #[error("invalid cache key: {0}")]
    InvalidKey(String),
}
