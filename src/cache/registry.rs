//! Cross-key cache maintenance: bulk clears, expiry sweeps, statistics.
//!
//! The registry knows which resource kinds belong to the caching system
//! (via the policy table) and only ever touches keys under their
//! prefixes, so unrelated state sharing the same store survives a
//! `clear_all`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::envelope::CacheEntry;
use super::freshness::is_fresh;
use super::key::CacheKey;
use crate::store::{SnapshotStore, StoreError};

/// Freshness windows per resource kind.
///
/// The window is a property of the kind's declared policy, not of the
/// stored entries, so windows can be tuned without invalidating existing
/// snapshots.
#[derive(Debug, Clone, Default)]
pub struct CachePolicy {
    windows: HashMap<String, Duration>,
}

impl CachePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, kind: impl Into<String>, window: Duration) -> Self {
        self.windows.insert(kind.into(), window);
        self
    }

    pub fn window(&self, kind: &str) -> Option<Duration> {
        self.windows.get(kind).copied()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.windows.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.windows.iter().map(|(kind, window)| (kind.as_str(), *window))
    }
}

/// Aggregate numbers over stored snapshots, for debugging and settings
/// screens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub entries: u64,
    /// Present but undecodable entries. Counted, never an error.
    pub unreadable: u64,
    pub oldest_age: Option<Duration>,
    pub total_bytes: u64,
}

pub struct CacheRegistry {
    store: Arc<dyn SnapshotStore>,
    policy: CachePolicy,
}

impl CacheRegistry {
    pub fn new(store: Arc<dyn SnapshotStore>, policy: CachePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Delete every snapshot of `kind`. Returns the number deleted.
    pub fn clear(&self, kind: &str) -> Result<u64, StoreError> {
        let prefix = CacheKey::prefix_for(kind);
        let mut deleted = 0;
        for key in self.keys_with_prefix(&prefix)? {
            self.store.delete(&key)?;
            deleted += 1;
        }
        debug!(kind, deleted, "Cleared cached snapshots");
        Ok(deleted)
    }

    /// Delete every snapshot of every registered kind, leaving keys
    /// outside the registered prefixes untouched.
    pub fn clear_all(&self) -> Result<u64, StoreError> {
        let mut deleted = 0;
        for kind in self.policy.kinds() {
            let prefix = CacheKey::prefix_for(kind);
            for key in self.keys_with_prefix(&prefix)? {
                self.store.delete(&key)?;
                deleted += 1;
            }
        }
        debug!(deleted, "Cleared all registered cache kinds");
        Ok(deleted)
    }

    /// Aggregate over one kind, or over every registered kind.
    pub fn stats(&self, kind: Option<&str>) -> Result<CacheStatsReport, StoreError> {
        let keys = match kind {
            Some(kind) => self.keys_with_prefix(&CacheKey::prefix_for(kind))?,
            None => self.registered_keys()?,
        };

        let now = Utc::now();
        let mut report = CacheStatsReport::default();
        for key in keys {
            let raw = match self.store.get(&key)? {
                Some(raw) => raw,
                None => continue,
            };
            report.entries += 1;
            report.total_bytes += raw.len() as u64;
            match CacheEntry::<serde_json::Value>::decode(&raw) {
                Some(entry) => {
                    if let Ok(age) = now.signed_duration_since(entry.cached_at).to_std() {
                        report.oldest_age = Some(report.oldest_age.map_or(age, |o| o.max(age)));
                    }
                }
                None => report.unreadable += 1,
            }
        }
        Ok(report)
    }

    /// Delete every snapshot older than its kind's window. Unreadable
    /// entries cannot be aged, so they are swept too. Returns the number
    /// deleted.
    pub fn clear_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut deleted = 0;
        for (kind, window) in self.policy.iter() {
            for key in self.keys_with_prefix(&CacheKey::prefix_for(kind))? {
                let raw = match self.store.get(&key)? {
                    Some(raw) => raw,
                    None => continue,
                };
                let expired = match CacheEntry::<serde_json::Value>::decode(&raw) {
                    Some(entry) => !is_fresh(entry.cached_at, window, now),
                    None => true,
                };
                if expired {
                    self.store.delete(&key)?;
                    deleted += 1;
                }
            }
        }
        debug!(deleted, "Swept expired snapshots");
        Ok(deleted)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .store
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    fn registered_keys(&self) -> Result<Vec<String>, StoreError> {
        let prefixes: Vec<String> = self.policy.kinds().map(CacheKey::prefix_for).collect();
        Ok(self
            .store
            .keys()?
            .into_iter()
            .filter(|k| prefixes.iter().any(|p| k.starts_with(p.as_str())))
            .collect())
    }
}
