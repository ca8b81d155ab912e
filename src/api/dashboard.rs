//! Cached data facade for dashboard call sites.
//!
//! One orchestrated path replaces per-page fetch/cache plumbing: each
//! method derives its cache key from the resource kind plus role (or a
//! query digest), looks the freshness window up in the policy table, and
//! lets the snapshot cache decide between stored data and the network.
//!
//! Snapshots hold the raw wire payloads; domain conversions (records to
//! claims, changes to alerts) run on top of whatever the cache returns,
//! so a stale-fallback read still renders exactly like a live one.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::cache::{CacheKey, CachePolicy, CacheRegistry, Fetched, SnapshotCache};
use crate::config::Config;
use crate::models::{
    Alert, BeneficiaryRecord, ChangeDetection, Claim, LegalAssistance, NewClaimSubmission,
    ResourceSuggestions, Role, SchemeEligibility,
};
use crate::store::{FileStore, SnapshotStore};

use super::client::{ApiClient, SubmitAck};

// ============================================================================
// Resource kinds
// ============================================================================

pub const KIND_ALERTS: &str = "alerts";
pub const KIND_BENEFICIARIES: &str = "beneficiaries";
pub const KIND_SCHEME_ELIGIBILITY: &str = "scheme_eligibility";
pub const KIND_RESOURCE_SUGGESTIONS: &str = "resource_suggestions";
pub const KIND_LEGAL_ASSISTANCE: &str = "legal_assistance";

/// Store key for acknowledged alert ids. Not a registered cache kind:
/// acknowledgements are user state, not a snapshot of remote data, and
/// must survive cache clears.
const ACKNOWLEDGED_ALERTS_KEY: &str = "acknowledged-alerts";

/// Window used for kinds missing from the policy table.
const FALLBACK_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Default freshness windows per resource kind: the alert feed is
/// volatile, eligibility and suggestions move slowly, assistance answers
/// barely change.
pub fn default_policy() -> CachePolicy {
    CachePolicy::new()
        .with_window(KIND_ALERTS, Duration::from_secs(5 * 60))
        .with_window(KIND_BENEFICIARIES, Duration::from_secs(30 * 60))
        .with_window(KIND_SCHEME_ELIGIBILITY, Duration::from_secs(30 * 60))
        .with_window(KIND_RESOURCE_SUGGESTIONS, Duration::from_secs(30 * 60))
        .with_window(KIND_LEGAL_ASSISTANCE, Duration::from_secs(60 * 60))
}

/// Cached facade over the backend API.
pub struct DashboardApi {
    client: ApiClient,
    store: Arc<dyn SnapshotStore>,
    cache: SnapshotCache,
    registry: CacheRegistry,
}

impl DashboardApi {
    pub fn new(client: ApiClient, store: Arc<dyn SnapshotStore>, policy: CachePolicy) -> Self {
        Self {
            client,
            store: Arc::clone(&store),
            cache: SnapshotCache::new(Arc::clone(&store)),
            registry: CacheRegistry::new(store, policy),
        }
    }

    /// Build from configuration: file-backed store in the cache
    /// directory, policy table with any configured overrides applied.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ApiClient::new(config.api_base_url())?;
        let store: Arc<dyn SnapshotStore> = Arc::new(FileStore::new(config.cache_dir()?)?);
        Ok(Self::new(client, store, config.cache_policy()))
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Registry for bulk clears, expiry sweeps, and cache statistics.
    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    fn window(&self, kind: &str) -> Duration {
        self.registry.policy().window(kind).unwrap_or(FALLBACK_WINDOW)
    }

    // ===== Cached reads =====

    /// Claims visible to the role, from the beneficiary snapshot.
    pub async fn beneficiaries(&self, role: Role, force_refresh: bool) -> Result<Fetched<Vec<Claim>>> {
        let key = CacheKey::new(KIND_BENEFICIARIES, role.as_str())?;
        let fetched = self
            .cache
            .fetch_with_cache(&key, self.window(KIND_BENEFICIARIES), force_refresh, || async {
                self.client.fetch_beneficiaries(role).await
            })
            .await?;
        Ok(fetched.map(|records: Vec<BeneficiaryRecord>| {
            records.into_iter().map(Claim::from_record).collect()
        }))
    }

    /// Alerts derived from the cached change-detection feed. Previously
    /// acknowledged alerts come back marked resolved.
    pub async fn alerts(&self, role: Role, force_refresh: bool) -> Result<Fetched<Vec<Alert>>> {
        let key = CacheKey::new(KIND_ALERTS, role.as_str())?;
        let fetched = self
            .cache
            .fetch_with_cache(&key, self.window(KIND_ALERTS), force_refresh, || async {
                self.client.fetch_change_detections(role).await
            })
            .await?;

        let acknowledged = self.acknowledged_alerts();
        Ok(fetched.map(|changes: Vec<ChangeDetection>| {
            changes
                .into_iter()
                .map(Alert::from_change)
                .map(|mut alert| {
                    if acknowledged.iter().any(|id| id == &alert.id) {
                        alert.resolved = true;
                    }
                    alert
                })
                .collect()
        }))
    }

    /// Per-beneficiary scheme eligibility for the role's region.
    pub async fn scheme_eligibility(
        &self,
        role: Role,
        force_refresh: bool,
    ) -> Result<Fetched<Vec<SchemeEligibility>>> {
        let key = CacheKey::new(KIND_SCHEME_ELIGIBILITY, role.as_str())?;
        self.cache
            .fetch_with_cache(&key, self.window(KIND_SCHEME_ELIGIBILITY), force_refresh, || async {
                self.client.fetch_scheme_eligibility(role).await
            })
            .await
    }

    /// Suggested interventions for the role's region.
    pub async fn resource_suggestions(
        &self,
        role: Role,
        force_refresh: bool,
    ) -> Result<Fetched<ResourceSuggestions>> {
        let key = CacheKey::new(KIND_RESOURCE_SUGGESTIONS, role.as_str())?;
        self.cache
            .fetch_with_cache(
                &key,
                self.window(KIND_RESOURCE_SUGGESTIONS),
                force_refresh,
                || async { self.client.fetch_resource_suggestions(role).await },
            )
            .await
    }

    /// Legal-assistance answer for a free-text question, keyed by a
    /// digest of the normalized query so repeat questions hit the cache.
    pub async fn legal_assistance(
        &self,
        query: &str,
        role: Role,
        force_refresh: bool,
    ) -> Result<Fetched<LegalAssistance>> {
        let key = CacheKey::new(KIND_LEGAL_ASSISTANCE, &query_digest(query))?;
        self.cache
            .fetch_with_cache(&key, self.window(KIND_LEGAL_ASSISTANCE), force_refresh, || async {
                self.client.fetch_legal_assistance(query, role).await
            })
            .await
    }

    // ===== Writes =====

    /// Submit a new claim. Submissions are never cached; a successful
    /// submission drops the beneficiary snapshots so the next read
    /// reflects it.
    pub async fn submit_claim(&self, submission: &NewClaimSubmission) -> Result<SubmitAck> {
        let ack = self.client.submit_beneficiary(submission).await?;
        if let Err(e) = self.registry.clear(KIND_BENEFICIARIES) {
            warn!(error = %e, "Failed to invalidate beneficiary snapshots after submission");
        }
        Ok(ack)
    }

    // ===== Acknowledgements =====

    /// Record an alert as acknowledged. Survives cache clears.
    pub fn acknowledge_alert(&self, alert_id: &str) -> Result<()> {
        let mut acknowledged = self.acknowledged_alerts();
        if !acknowledged.iter().any(|id| id == alert_id) {
            acknowledged.push(alert_id.to_string());
            let raw = serde_json::to_string(&acknowledged)?;
            self.store.set(ACKNOWLEDGED_ALERTS_KEY, &raw)?;
        }
        Ok(())
    }

    /// Ids of every acknowledged alert. Unreadable state reads as empty.
    pub fn acknowledged_alerts(&self) -> Vec<String> {
        match self.store.get(ACKNOWLEDGED_ALERTS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read acknowledged alerts");
                Vec::new()
            }
        }
    }
}

/// Hex digest prefix used as the key discriminator for free-text queries.
fn query_digest(query: &str) -> String {
    let digest = Sha256::digest(query.trim().to_lowercase().as_bytes());
    hex::encode(&digest[..8])
}
