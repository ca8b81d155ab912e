//! Cache-aside fetch orchestration with stale fallback.
//!
//! [`SnapshotCache::fetch_with_cache`] is the single control flow behind
//! every data-fetching wrapper: check the stored snapshot, refresh over
//! the network when it is missing, stale, or a refresh is forced, and
//! degrade to the last stored snapshot when the network fails.
//!
//! Staleness only prefers a refresh; it never discards a usable snapshot.
//! A stale snapshot is served whenever the refresh that should replace it
//! fails. Only a failure with no snapshot at all reaches the caller, and
//! it reaches the caller unchanged.
//!
//! Concurrent calls for the same key are coalesced: one caller fetches
//! while the others wait on a per-key lock, then re-read the snapshot the
//! winner wrote. Fresh hits never touch the lock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::envelope::CacheEntry;
use super::freshness::is_fresh;
use super::key::CacheKey;
use crate::store::SnapshotStore;

/// Where a fetched value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// Snapshot inside its freshness window; no network attempt was made.
    Cache,
    /// Fresh network response; the snapshot was overwritten.
    Network,
    /// Network failed; the last stored snapshot was served regardless of age.
    StaleFallback,
}

/// A fetched value together with its provenance, for "showing cached
/// data" indications at the call site.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    value: T,
    cached_at: DateTime<Utc>,
    source: FetchSource,
}

impl<T> Fetched<T> {
    fn new(value: T, cached_at: DateTime<Utc>, source: FetchSource) -> Self {
        Self {
            value,
            cached_at,
            source,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// When the value was fetched from the remote source.
    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    pub fn source(&self) -> FetchSource {
        self.source
    }

    pub fn is_from_cache(&self) -> bool {
        self.source != FetchSource::Network
    }

    /// Map the inner value, keeping provenance.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Fetched<U> {
        Fetched {
            value: f(self.value),
            cached_at: self.cached_at,
            source: self.source,
        }
    }
}

/// Cache-aside front end over a snapshot store.
pub struct SnapshotCache {
    store: Arc<dyn SnapshotStore>,
    // One fetch lock per distinct key. Bounded by the number of
    // resource-kind/discriminator combinations, so never evicted.
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Produce the best available value for `key`.
    ///
    /// * A snapshot younger than `max_age` is returned without a network
    ///   attempt, unless `force_refresh` is set.
    /// * Otherwise `remote` runs; its result overwrites the snapshot and
    ///   is returned.
    /// * If `remote` fails and any decodable snapshot exists (however
    ///   old), that snapshot is returned and the error suppressed.
    /// * If `remote` fails with no snapshot to fall back on, its error is
    ///   returned unchanged.
    ///
    /// `max_age` of zero forces a network attempt on every call while
    /// keeping the fallback behavior. Store read and write failures never
    /// fail the call; a failed read counts as a miss and a failed write is
    /// logged while the fetched value is still returned.
    pub async fn fetch_with_cache<T, F, Fut>(
        &self,
        key: &CacheKey,
        max_age: Duration,
        force_refresh: bool,
        remote: F,
    ) -> Result<Fetched<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let storage_key = key.storage_key();

        // Fresh hits short-circuit before the fetch lock, so a reader is
        // never blocked behind another caller's network round trip.
        if !force_refresh {
            if let Some(entry) = self.read_entry::<T>(&storage_key) {
                if is_fresh(entry.cached_at, max_age, Utc::now()) {
                    debug!(key = %storage_key, "Cache hit");
                    return Ok(Fetched::new(entry.data, entry.cached_at, FetchSource::Cache));
                }
            }
        }

        let lock = self.fetch_lock(&storage_key).await;
        let _guard = lock.lock().await;

        // Re-read after acquiring the lock: a coalesced caller may have
        // refreshed this key while we waited. Whatever is stored now is
        // also the fallback candidate if the network fails.
        let fallback = match self.read_entry::<T>(&storage_key) {
            Some(entry)
                if !force_refresh && is_fresh(entry.cached_at, max_age, Utc::now()) =>
            {
                debug!(key = %storage_key, "Cache hit after coalesced refresh");
                return Ok(Fetched::new(entry.data, entry.cached_at, FetchSource::Cache));
            }
            other => other,
        };

        match remote().await {
            Ok(value) => {
                let entry = CacheEntry::new(value, key.kind());
                self.write_entry(&storage_key, &entry);
                debug!(key = %storage_key, "Snapshot refreshed from network");
                Ok(Fetched::new(entry.data, entry.cached_at, FetchSource::Network))
            }
            Err(err) => match fallback {
                Some(entry) => {
                    warn!(
                        key = %storage_key,
                        error = %err,
                        "Remote fetch failed; serving stored snapshot"
                    );
                    Ok(Fetched::new(
                        entry.data,
                        entry.cached_at,
                        FetchSource::StaleFallback,
                    ))
                }
                None => Err(err),
            },
        }
    }

    /// Read and decode the stored entry; read errors and corrupt payloads
    /// count as a miss.
    fn read_entry<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Snapshot store read failed; treating as miss");
                return None;
            }
        };
        CacheEntry::decode(&raw)
    }

    fn write_entry<T: Serialize>(&self, key: &str, entry: &CacheEntry<T>) {
        let raw = match entry.encode() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode cache entry; skipping write");
                return;
            }
        };
        if let Err(e) = self.store.set(key, &raw) {
            warn!(key, error = %e, "Snapshot store write failed; returning value uncached");
        }
    }

    async fn fetch_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self.inflight.lock().await;
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("remote unavailable")]
    struct RemoteDown;

    fn cache_over(store: Arc<MemoryStore>) -> SnapshotCache {
        SnapshotCache::new(store)
    }

    fn key(kind: &str, discriminator: &str) -> CacheKey {
        CacheKey::new(kind, discriminator).expect("key")
    }

    /// Store an entry whose `cached_at` lies `age_secs` in the past.
    fn seed<T: Serialize>(store: &MemoryStore, key: &CacheKey, data: T, age_secs: i64) {
        let mut entry = CacheEntry::new(data, key.kind());
        entry.cached_at = Utc::now() - ChronoDuration::seconds(age_secs);
        store
            .set(&key.storage_key(), &entry.encode().expect("encode"))
            .expect("seed");
    }

    fn stored_entry(store: &MemoryStore, key: &CacheKey) -> CacheEntry<Vec<String>> {
        let raw = store
            .get(&key.storage_key())
            .expect("get")
            .expect("entry present");
        CacheEntry::decode(&raw).expect("decodable")
    }

    #[tokio::test]
    async fn test_fresh_hit_avoids_network() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(Arc::clone(&store));
        let key = key("alerts", "SDLC");
        seed(&store, &key, vec!["a1".to_string()], 100);

        let calls = AtomicUsize::new(0);
        let fetched = cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::from_secs(300), false, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(vec!["never".to_string()]) }
            })
            .await
            .expect("fetch");

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(fetched.value(), &vec!["a1".to_string()]);
        assert_eq!(fetched.source(), FetchSource::Cache);
        assert!(fetched.is_from_cache());
    }

    #[tokio::test]
    async fn test_stale_entry_triggers_refresh() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(Arc::clone(&store));
        let key = key("alerts", "SDLC");
        seed(&store, &key, vec!["a1".to_string()], 400);

        let calls = AtomicUsize::new(0);
        let fetched = cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::from_secs(300), false, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(vec!["a1".to_string(), "a2".to_string()]) }
            })
            .await
            .expect("fetch");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetched.source(), FetchSource::Network);
        assert_eq!(fetched.value().len(), 2);

        // The snapshot was overwritten with the new payload and timestamp.
        let entry = stored_entry(&store, &key);
        assert_eq!(entry.data.len(), 2);
        assert!(Utc::now().signed_duration_since(entry.cached_at).num_seconds() < 5);
    }

    #[tokio::test]
    async fn test_fallback_on_remote_failure() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(Arc::clone(&store));
        let key = key("alerts", "SDLC");
        seed(&store, &key, vec!["a1".to_string(), "a2".to_string()], 4000);

        let fetched = cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::from_secs(300), false, || async {
                Err(RemoteDown.into())
            })
            .await
            .expect("stale fallback instead of error");

        assert_eq!(fetched.source(), FetchSource::StaleFallback);
        assert_eq!(fetched.value().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_with_empty_cache_propagates_original_error() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(store);
        let key = key("alerts", "SDLC");

        let err = cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::from_secs(300), false, || async {
                Err(RemoteDown.into())
            })
            .await
            .expect_err("no fallback available");

        // The caller sees the remote error itself, not a wrapper.
        assert!(err.downcast_ref::<RemoteDown>().is_some());
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_freshness() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(Arc::clone(&store));
        let key = key("alerts", "SDLC");
        seed(&store, &key, vec!["old".to_string()], 0);

        let calls = AtomicUsize::new(0);
        let fetched = cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::from_secs(300), true, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(vec!["new".to_string()]) }
            })
            .await
            .expect("fetch");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetched.value(), &vec!["new".to_string()]);
        assert_eq!(fetched.source(), FetchSource::Network);
    }

    #[tokio::test]
    async fn test_force_refresh_still_falls_back_on_failure() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(Arc::clone(&store));
        let key = key("alerts", "SDLC");
        seed(&store, &key, vec!["old".to_string()], 0);

        let fetched = cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::from_secs(300), true, || async {
                Err(RemoteDown.into())
            })
            .await
            .expect("fallback");

        assert_eq!(fetched.source(), FetchSource::StaleFallback);
        assert_eq!(fetched.value(), &vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_entry_treated_as_absent() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(Arc::clone(&store));
        let key = key("alerts", "SDLC");
        store.set(&key.storage_key(), "{definitely not json").expect("set");

        // With a working remote the corrupt entry behaves like a miss.
        let calls = AtomicUsize::new(0);
        let fetched = cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::from_secs(300), false, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(vec!["fresh".to_string()]) }
            })
            .await
            .expect("fetch");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetched.source(), FetchSource::Network);

        // With a failing remote and only a corrupt entry there is no
        // fallback, so the remote error surfaces.
        store.set(&key.storage_key(), "{definitely not json").expect("set");
        let err = cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::from_secs(300), true, || async {
                Err(RemoteDown.into())
            })
            .await
            .expect_err("corrupt entry is not a fallback");
        assert!(err.downcast_ref::<RemoteDown>().is_some());
    }

    #[tokio::test]
    async fn test_consecutive_forced_refreshes_keep_last_write() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(Arc::clone(&store));
        let key = key("beneficiaries", "DLC");

        cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::from_secs(300), true, || async {
                Ok(vec!["first".to_string()])
            })
            .await
            .expect("first");
        let first = stored_entry(&store, &key);

        cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::from_secs(300), true, || async {
                Ok(vec!["second".to_string()])
            })
            .await
            .expect("second");
        let second = stored_entry(&store, &key);

        assert_eq!(second.data, vec!["second".to_string()]);
        assert!(second.cached_at >= first.cached_at);
    }

    #[tokio::test]
    async fn test_zero_window_always_refreshes_but_keeps_fallback() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(Arc::clone(&store));
        let key = key("alerts", "DLC");
        seed(&store, &key, vec!["snapshot".to_string()], 0);

        let calls = AtomicUsize::new(0);
        cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::ZERO, false, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(vec!["refetched".to_string()]) }
            })
            .await
            .expect("fetch");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let fetched = cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::ZERO, false, || async {
                Err(RemoteDown.into())
            })
            .await
            .expect("fallback");
        assert_eq!(fetched.source(), FetchSource::StaleFallback);
        assert_eq!(fetched.value(), &vec!["refetched".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_for_same_key_coalesce() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(cache_over(store));
        let key = key("alerts", "SDLC");
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |cache: Arc<SnapshotCache>, key: CacheKey, calls: Arc<AtomicUsize>| async move {
            cache
                .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::from_secs(300), false, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(vec!["shared".to_string()])
                    }
                })
                .await
        };

        let (a, b) = tokio::join!(
            fetch(Arc::clone(&cache), key.clone(), Arc::clone(&calls)),
            fetch(Arc::clone(&cache), key.clone(), Arc::clone(&calls)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.expect("a").value(), &vec!["shared".to_string()]);
        assert_eq!(b.expect("b").value(), &vec!["shared".to_string()]);
    }

    /// End-to-end timeline: fresh hit, stale refresh, then offline fallback.
    #[tokio::test]
    async fn test_alert_feed_timeline() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_over(Arc::clone(&store));
        let key = key("alerts", "SDLC");
        let window = Duration::from_secs(300);

        // t=0: first fetch populates the snapshot.
        cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, window, false, || async {
                Ok(vec!["a1".to_string()])
            })
            .await
            .expect("initial");

        // t=100s: inside the window, no network.
        let calls = AtomicUsize::new(0);
        let hit = cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, window, false, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(vec![]) }
            })
            .await
            .expect("hit");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(hit.value(), &vec!["a1".to_string()]);

        // t=400s: stale, refreshed with a second alert.
        seed(&store, &key, vec!["a1".to_string()], 400);
        let refreshed = cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, window, false, || async {
                Ok(vec!["a1".to_string(), "a2".to_string()])
            })
            .await
            .expect("refresh");
        assert_eq!(refreshed.value().len(), 2);

        // t=500s: backend down, the two-element snapshot is served.
        seed(&store, &key, vec!["a1".to_string(), "a2".to_string()], 100);
        let offline = cache
            .fetch_with_cache::<Vec<String>, _, _>(&key, Duration::ZERO, false, || async {
                Err(RemoteDown.into())
            })
            .await
            .expect("fallback");
        assert_eq!(offline.value().len(), 2);
        assert_eq!(offline.source(), FetchSource::StaleFallback);
    }

    #[test]
    fn test_fetched_map_keeps_provenance() {
        let fetched = Fetched::new(vec![1, 2, 3], Utc::now(), FetchSource::StaleFallback);
        let mapped = fetched.map(|v| v.len());
        assert_eq!(*mapped.value(), 3);
        assert_eq!(mapped.source(), FetchSource::StaleFallback);
        assert!(mapped.is_from_cache());
    }
}
