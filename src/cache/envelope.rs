//! Cache entry envelope and codec.
//!
//! A stored snapshot wraps the payload with the instant it was fetched
//! from the remote source and a tag naming the resource kind it belongs
//! to. Entries are only ever replaced whole; `cached_at` never changes
//! except through a full overwrite.
//!
//! Decoding is deliberately tolerant: a corrupt or wrong-shape document
//! reads as "no entry" rather than an error, since the next successful
//! fetch overwrites it anyway.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    pub source: String,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, source: impl Into<String>) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
            source: source.into(),
        }
    }
}

impl<T: Serialize> CacheEntry<T> {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl<T: DeserializeOwned> CacheEntry<T> {
    /// Parse a stored envelope. Any failure reads as absent.
    pub fn decode(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(error = %e, "Discarding unreadable cache entry");
                None
            }
        }
    }
}
