//! HTTP client for the ATTOM property snapshot endpoint.
//!
//! One operation: a point-radius GET derived from a viewport. The client
//! performs no interpretation of the payload and no retries — a failed call
//! fails the whole operation for that request, and deduplication is the
//! orchestration layer's job.

use std::time::Duration;

use async_trait::async_trait;
use parcel_map_attom_models::Bounds;
use parcel_map_tiling::radius_miles_for_bounds;

use crate::{AttomError, PropertyApi};

/// Default snapshot endpoint.
const DEFAULT_BASE_URL: &str =
    "https://api.gateway.attomdata.com/propertyapi/v1.0.0/property/snapshot";

/// Default request timeout. The upstream has no documented SLA; a hung
/// connection must not hold the caller's request open indefinitely.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Maximum number of response-body characters carried in an error. The
/// payload contains licensed data; diagnostics get an excerpt, never the
/// bulk.
const BODY_EXCERPT_CHARS: usize = 200;

/// Client for the ATTOM property API.
pub struct AttomClient {
    api_key: Option<String>,
    base_url: String,
    http: reqwest::Client,
}

impl AttomClient {
    /// Creates a client with an explicit key, endpoint, and timeout.
    ///
    /// `api_key` may be `None`; the missing-key failure is reported on the
    /// first call rather than at construction so a server can boot without
    /// the secret and fail only the routes that need it.
    ///
    /// # Errors
    ///
    /// Returns [`AttomError::Http`] if the HTTP client cannot be built.
    pub fn new(
        api_key: Option<String>,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, AttomError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key: api_key.filter(|key| !key.is_empty()),
            base_url,
            http,
        })
    }

    /// Creates a client from `ATTOM_API_KEY`, `ATTOM_BASE_URL`, and
    /// `ATTOM_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`AttomError::Http`] if the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, AttomError> {
        let api_key = std::env::var("ATTOM_API_KEY").ok();
        let base_url =
            std::env::var("ATTOM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout = std::env::var("ATTOM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::new(api_key, base_url, Duration::from_secs(timeout))
    }
}

#[async_trait]
impl PropertyApi for AttomClient {
    async fn fetch_snapshot_for_bounds(
        &self,
        bounds: &Bounds,
    ) -> Result<serde_json::Value, AttomError> {
        // Key check comes first, before any network attempt.
        let api_key = self.api_key.as_deref().ok_or(AttomError::MissingApiKey)?;

        let (lat, lng) = bounds.center();
        let radius = radius_miles_for_bounds(bounds.north, bounds.south, bounds.east, bounds.west);
        let url = format!(
            "{}?latitude={lat}&longitude={lng}&radius={radius}",
            self.base_url
        );

        log::debug!("ATTOM snapshot query: lat={lat}, lng={lng}, radius={radius}mi");

        let response = self
            .http
            .get(&url)
            .header("APIKey", api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttomError::UpstreamStatus {
                status: status.as_u16(),
                body_excerpt: excerpt(&body),
            });
        }

        Ok(response.json().await?)
    }
}

/// First [`BODY_EXCERPT_CHARS`] characters of a response body.
fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}
