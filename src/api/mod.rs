//! REST API client module for the FRA dashboard backend.
//!
//! [`ApiClient`] talks to the backend directly; [`DashboardApi`] is what
//! call sites should use - the same endpoints, fronted by the snapshot
//! cache with per-resource freshness windows and stale fallback.

pub mod client;
pub mod dashboard;
pub mod error;

pub use client::{ApiClient, SubmitAck, DEFAULT_BASE_URL};
pub use dashboard::{default_policy, DashboardApi};
pub use error::ApiError;
