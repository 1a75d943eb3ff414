#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Two-tier TTL cache for normalized property data.
//!
//! Three logical namespaces (map tiles, address mappings, snapshots), each
//! with its own retention policy, layered over an in-process L1
//! ([`MemoryBackend`]) and an optional remote L2 (Redis). Reads check L1
//! first, fall through to L2, and backfill L1 on a hit. Entries are always
//! replaced wholesale — no field-level mutation — which is what lets
//! concurrent request handlers share the store without finer locking.

pub mod memory;
pub mod redis_backend;
pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;
pub use store::{CacheStore, CacheTier};

/// Errors from cache backends.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Stored value failed to serialize or deserialize.
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The three logical cache namespaces, each independently keyed and TTL'd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Parcel lists per map tile. Pin data changes slowly; a short TTL
    /// balances staleness against upstream cost when users pan and zoom.
    MapTile,
    /// Address-to-parcel mappings. Close to permanent — re-deriving one
    /// wastes an upstream call for a fact that essentially never changes.
    Address,
    /// Full property snapshots, internally subdivided per section.
    Snapshot,
}

impl CacheNamespace {
    /// Key prefix isolating this namespace in the shared backend.
    #[must_use]
    pub const fn key_prefix(self) -> &'static str {
        match self {
            Self::MapTile => "tile:",
            Self::Address => "addr:",
            Self::Snapshot => "snap:",
        }
    }

    /// Default logical TTL for entries in this namespace.
    #[must_use]
    pub const fn default_ttl(self) -> Duration {
        match self {
            Self::MapTile => Duration::minutes(30),
            Self::Address => Duration::days(120),
            Self::Snapshot => Duration::days(30),
        }
    }

    /// Extra physical retention beyond the logical TTL.
    ///
    /// Snapshot entries are kept past logical expiry so the
    /// stale-while-revalidate path can still read them; the other
    /// namespaces evict at logical expiry.
    #[must_use]
    pub const fn stale_grace(self) -> Duration {
        match self {
            Self::Snapshot => Duration::days(30),
            Self::MapTile | Self::Address => Duration::zero(),
        }
    }
}

/// A cached value with its logical expiry.
///
/// Created on first successful fetch for a key, overwritten (never merged)
/// on refresh, and expiry-checked on every read. The store owns entries;
/// callers treat returned values as immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// The cached value.
    pub value: T,
    /// Logical staleness horizon.
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Builds an entry expiring `ttl` from `now`.
    pub fn new(value: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: now + ttl,
        }
    }

    /// Whether the entry is still fresh at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// A key-value backend with per-key expiry.
///
/// The system is agnostic to whether this is a managed remote store or an
/// embedded one, provided reads and writes are atomic per key.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Reads the raw value for a key, `None` when absent or expired.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend is unreachable.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Writes a raw value with a physical TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend is unreachable.
    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}
