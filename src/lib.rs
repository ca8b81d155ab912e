//! pattacache - client data layer for the FRA claims dashboard.
//!
//! Everything the dashboard shows comes from a remote backend; this crate
//! is the glue in between: typed models for the backend's payloads, an
//! HTTP client for its endpoints, and a snapshot cache so each role's
//! views stay usable when the backend is slow or down.
//!
//! The cache is the designed core. Call sites go through
//! [`api::DashboardApi`], which keys snapshots by resource kind and role,
//! applies per-kind freshness windows, and falls back to the last stored
//! snapshot when a refresh fails. See the [`cache`] module for the
//! contract.

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod store;

pub use api::{ApiClient, ApiError, DashboardApi};
pub use cache::{
    CacheEntry, CacheError, CacheKey, CachePolicy, CacheRegistry, CacheStatsReport, FetchSource,
    Fetched, SnapshotCache,
};
pub use config::Config;
pub use models::Role;
pub use store::{FileStore, MemoryStore, SnapshotStore, StoreError};
