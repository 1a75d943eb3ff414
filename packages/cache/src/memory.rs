//! In-process cache backend.
//!
//! Serves as the L1 tier in front of Redis and as the whole store in
//! memory-only deployments (tests, local dev). Expired entries are dropped
//! on read; there is no sweeper — the working set is bounded by the tiles
//! and parcels a deployment actually touches.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::{CacheBackend, CacheError};

/// Concurrent in-process key-value store with per-key expiry.
#[derive(Default)]
pub struct MemoryBackend {
    entries: DashMap<String, (String, DateTime<Utc>)>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (possibly expired, not yet dropped) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the backend holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Utc::now();

        if let Some(entry) = self.entries.get(key) {
            let (value, expires_at) = entry.value();
            if now < *expires_at {
                return Ok(Some(value.clone()));
            }
        }

        // Expired: drop eagerly so the map does not accumulate dead keys.
        self.entries.remove_if(key, |_, (_, expires_at)| now >= *expires_at);
        Ok(None)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), (value, Utc::now() + ttl));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_within_ttl() {
        let backend = MemoryBackend::new();
        backend
            .set_raw("k", "v".to_string(), Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(backend.get_raw("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent_and_are_dropped() {
        let backend = MemoryBackend::new();
        backend
            .set_raw("k", "v".to_string(), Duration::milliseconds(-1))
            .await
            .unwrap();
        assert_eq!(backend.get_raw("k").await.unwrap(), None);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn overwrites_replace_wholesale() {
        let backend = MemoryBackend::new();
        backend
            .set_raw("k", "old".to_string(), Duration::seconds(60))
            .await
            .unwrap();
        backend
            .set_raw("k", "new".to_string(), Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(backend.get_raw("k").await.unwrap(), Some("new".to_string()));
        assert_eq!(backend.len(), 1);
    }
}
