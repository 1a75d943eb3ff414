#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Orchestration of the three property-data operations: map parcels,
//! address resolution, and property snapshots.
//!
//! Each operation follows the same shape — cache check, coalesced upstream
//! fetch, normalize, cache write — but they differ in failure posture: map
//! pins are best-effort and degrade to an empty list, while address
//! resolution and snapshots propagate upstream failures to the caller.

pub mod config;
pub mod service;

use parcel_map_attom::AttomError;
use parcel_map_cache::CacheTier;
use serde::Serialize;

pub use config::ServiceConfig;
pub use service::{MapParcels, ParcelService, PropertySnapshot, ResolvedParcel};

/// Errors surfaced by the orchestration layer.
///
/// `Clone` because a single failure inside a coalesced flight is delivered
/// to every waiting caller. Cache backend failures never appear here: the
/// cache degrades to a miss internally.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// The upstream API key is not configured. A deployment problem, not a
    /// request problem.
    #[error("upstream API access is not configured")]
    Configuration,

    /// The upstream answered with a non-2xx status.
    #[error("upstream returned {status}: {body_excerpt}")]
    Upstream {
        /// HTTP status code from the upstream.
        status: u16,
        /// Leading excerpt of the upstream response body.
        body_excerpt: String,
    },

    /// The upstream request failed in transport (connect, timeout, TLS).
    #[error("upstream request failed: {0}")]
    Transport(String),

    /// A snapshot was requested for an identifier with no cached record and
    /// no coordinates to fetch one with.
    #[error("no coordinates available to locate this property")]
    MissingLocation,
}

impl From<AttomError> for ServiceError {
    fn from(err: AttomError) -> Self {
        match err {
            AttomError::MissingApiKey => Self::Configuration,
            AttomError::UpstreamStatus {
                status,
                body_excerpt,
            } => Self::Upstream {
                status,
                body_excerpt,
            },
            AttomError::Http(e) => Self::Transport(e.to_string()),
        }
    }
}

/// Diagnostic tag reporting how a response was satisfied. Informational
/// only; clients must not branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// Served from the in-process cache tier.
    Memory,
    /// Served from the remote cache tier.
    Redis,
    /// Fetched from the upstream for this request.
    Miss,
    /// Served a logically-expired snapshot while a refresh runs.
    Stale,
    /// Joined another caller's in-flight fetch.
    Singleflight,
    /// Suppressed by the per-caller tile interval gate.
    RateLimited,
}

impl From<CacheTier> for CacheStatus {
    fn from(tier: CacheTier) -> Self {
        match tier {
            CacheTier::Memory => Self::Memory,
            CacheTier::Redis => Self::Redis,
        }
    }
}
