#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! ATTOM property API client and response normalization.
//!
//! The upstream API is expensive, rate-limited, and inconsistent about key
//! names and nesting depth across endpoints. This crate issues the single
//! point-radius query ([`client`]) and maps the heterogeneous per-property
//! JSON into the fixed shapes of `parcel_map_attom_models` ([`normalize`],
//! [`sections`]). Normalization never raises: malformed fields degrade to
//! `None`, and records without resolvable coordinates are dropped outright.

pub mod client;
pub mod extract;
pub mod normalize;
pub mod sections;

use async_trait::async_trait;
use parcel_map_attom_models::Bounds;

/// Errors from the upstream property API.
#[derive(Debug, thiserror::Error)]
pub enum AttomError {
    /// The required API key is not configured. Checked before any network
    /// call and never retried.
    #[error("ATTOM API key is not configured")]
    MissingApiKey,

    /// The upstream returned a non-2xx status. Carries only the first
    /// ~200 characters of the body — never the full payload.
    #[error("upstream returned {status}: {body_excerpt}")]
    UpstreamStatus {
        /// HTTP status code.
        status: u16,
        /// Leading excerpt of the response body, for diagnostics.
        body_excerpt: String,
    },

    /// HTTP transport failure (connect, timeout, TLS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// The one upstream operation: fetch the full snapshot payload for every
/// property within a viewport's point-radius query.
///
/// A trait so the orchestration layer can be exercised against a stub.
#[async_trait]
pub trait PropertyApi: Send + Sync {
    /// Issues the point-radius query for the given bounds and returns the
    /// parsed JSON body unmodified. No interpretation of the payload shape
    /// happens here.
    ///
    /// # Errors
    ///
    /// Returns [`AttomError`] if the key is missing, the request fails, or
    /// the upstream answers non-2xx.
    async fn fetch_snapshot_for_bounds(
        &self,
        bounds: &Bounds,
    ) -> Result<serde_json::Value, AttomError>;
}
