//! HTTP client for the FRA dashboard backend.
//!
//! Thin typed wrapper over the backend's REST endpoints. Every read is
//! role-scoped: the backend returns the whole district for DLC, one block
//! for SDLC, and one gram panchayat for Grama Sabha.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{
    BeneficiaryRecord, ChangeDetection, LegalAssistance, NewClaimSubmission, ResourceSuggestions,
    Role, SchemeEligibility,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default backend base URL for local development.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// HTTP request timeout in seconds.
/// The eligibility and assistance endpoints run model inference
/// server-side and can take tens of seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Acknowledgement returned by `POST /add-beneficiary`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAck {
    pub message: String,
}

/// API client for the FRA backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests.
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a client with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if a response is successful. Returns Ok(Some(response)) for
    /// success, Ok(None) for rate limit (should retry), or Err otherwise.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.endpoint(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(&url)
                .query(query)
                .headers(self.auth_headers()?)
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.endpoint(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .post(&url)
                .headers(self.auth_headers()?)
                .json(body)
                .send()
                .await
                .with_context(|| format!("Failed to send POST request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    // ===== Data Fetching Methods =====

    /// Fetch beneficiary records visible to the given role.
    pub async fn fetch_beneficiaries(&self, role: Role) -> Result<Vec<BeneficiaryRecord>> {
        let records: Vec<BeneficiaryRecord> = self
            .get_json("/get-beneficiaries", &[("role", role.as_str())])
            .await?;
        debug!(role = %role, count = records.len(), "Fetched beneficiary records");
        Ok(records)
    }

    /// Fetch the change-detection feed visible to the given role.
    pub async fn fetch_change_detections(&self, role: Role) -> Result<Vec<ChangeDetection>> {
        let changes: Vec<ChangeDetection> = self
            .get_json("/monitor-changes", &[("role", role.as_str())])
            .await?;
        debug!(role = %role, count = changes.len(), "Fetched change detections");
        Ok(changes)
    }

    /// Fetch per-beneficiary scheme eligibility verdicts.
    pub async fn fetch_scheme_eligibility(&self, role: Role) -> Result<Vec<SchemeEligibility>> {
        self.get_json("/get-scheme-eligibility", &[("role", role.as_str())])
            .await
    }

    /// Fetch suggested interventions for the role's region.
    pub async fn fetch_resource_suggestions(&self, role: Role) -> Result<ResourceSuggestions> {
        self.get_json("/suggest-resources", &[("role", role.as_str())])
            .await
    }

    /// Ask the legal-assistance service a free-text question.
    pub async fn fetch_legal_assistance(&self, query: &str, role: Role) -> Result<LegalAssistance> {
        let body = serde_json::json!({ "query": query, "role": role.as_str() });
        self.post_json("/legal-assistance", &body).await
    }

    /// Submit a new claim record.
    pub async fn submit_beneficiary(&self, submission: &NewClaimSubmission) -> Result<SubmitAck> {
        self.post_json("/add-beneficiary", submission).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8000/").expect("client");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(
            client.endpoint("/get-beneficiaries"),
            "http://localhost:8000/get-beneficiaries"
        );
    }

    #[test]
    fn test_auth_headers_carry_bearer_token() {
        let client = ApiClient::new(DEFAULT_BASE_URL)
            .expect("client")
            .with_token("abc123".to_string());
        let headers = client.auth_headers().expect("headers");
        assert_eq!(
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
            Some("Bearer abc123")
        );

        let anonymous = ApiClient::new(DEFAULT_BASE_URL).expect("client");
        assert!(anonymous
            .auth_headers()
            .expect("headers")
            .get(header::AUTHORIZATION)
            .is_none());
    }

    #[test]
    fn test_parse_submit_ack() {
        let ack: SubmitAck = serde_json::from_str(r#"{"message": "Beneficiary added successfully"}"#)
            .expect("parse");
        assert_eq!(ack.message, "Beneficiary added successfully");
    }
}
