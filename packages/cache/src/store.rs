//! The composed two-tier cache store.
//!
//! One `CacheStore` fronts an in-process L1 and an optional remote L2.
//! Backend failures degrade to a miss: the upstream API is the source of
//! truth, and a cache outage must cost extra upstream calls, not take the
//! service down. Failures are logged, not propagated.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{CacheBackend, CacheEntry, CacheNamespace, MemoryBackend};

/// Which tier satisfied a read. Surfaced in API responses as a diagnostic
/// cache tag; never used for correctness decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    /// In-process L1.
    Memory,
    /// Remote L2.
    Redis,
}

/// Two-tier cache store: L1 memory, optional L2 remote.
pub struct CacheStore {
    local: MemoryBackend,
    remote: Option<Arc<dyn CacheBackend>>,
}

impl CacheStore {
    /// Creates a store over an optional remote tier. With `None` the store
    /// is memory-only (tests, local development).
    #[must_use]
    pub fn new(remote: Option<Arc<dyn CacheBackend>>) -> Self {
        Self {
            local: MemoryBackend::new(),
            remote,
        }
    }

    /// Reads a fresh entry, treating expired entries as absent.
    pub async fn get<T: DeserializeOwned>(
        &self,
        namespace: CacheNamespace,
        key: &str,
    ) -> Option<(CacheEntry<T>, CacheTier)> {
        let (entry, tier) = self.get_any(namespace, key).await?;
        entry.is_fresh(Utc::now()).then_some((entry, tier))
    }

    /// Reads an entry regardless of logical freshness.
    ///
    /// Expired snapshot entries remain physically present for their stale
    /// grace period; this is the read the stale-while-revalidate path uses.
    pub async fn get_any<T: DeserializeOwned>(
        &self,
        namespace: CacheNamespace,
        key: &str,
    ) -> Option<(CacheEntry<T>, CacheTier)> {
        let full_key = format!("{}{key}", namespace.key_prefix());

        if let Some(raw) = self.read_tier(&self.local, &full_key, "memory").await
            && let Some(entry) = parse_entry(&full_key, &raw)
        {
            return Some((entry, CacheTier::Memory));
        }

        let remote = self.remote.as_ref()?;
        let raw = self.read_tier(remote.as_ref(), &full_key, "redis").await?;
        let entry: CacheEntry<T> = parse_entry(&full_key, &raw)?;

        // Backfill L1 for the remainder of the entry's physical lifetime.
        let physical_expiry = entry.expires_at + namespace.stale_grace();
        let remaining = physical_expiry - Utc::now();
        if remaining > Duration::zero()
            && let Err(e) = self.local.set_raw(&full_key, raw, remaining).await
        {
            log::warn!("L1 backfill failed for {full_key}: {e}");
        }

        Some((entry, CacheTier::Redis))
    }

    /// Writes an entry with the given logical TTL to both tiers.
    ///
    /// The physical TTL adds the namespace's stale grace so snapshot
    /// entries outlive their logical expiry.
    pub async fn set<T: Serialize>(
        &self,
        namespace: CacheNamespace,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheEntry<T>
    where
        T: Clone,
    {
        let full_key = format!("{}{key}", namespace.key_prefix());
        let entry = CacheEntry::new(value.clone(), Utc::now(), ttl);
        let physical_ttl = ttl + namespace.stale_grace();

        match serde_json::to_string(&entry) {
            Ok(raw) => {
                if let Err(e) = self.local.set_raw(&full_key, raw.clone(), physical_ttl).await {
                    log::warn!("L1 write failed for {full_key}: {e}");
                }
                if let Some(remote) = &self.remote
                    && let Err(e) = remote.set_raw(&full_key, raw, physical_ttl).await
                {
                    log::warn!("L2 write failed for {full_key}: {e}");
                }
            }
            Err(e) => log::warn!("failed to serialize cache entry for {full_key}: {e}"),
        }

        entry
    }

    async fn read_tier(
        &self,
        backend: &dyn CacheBackend,
        full_key: &str,
        tier: &str,
    ) -> Option<String> {
        match backend.get_raw(full_key).await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("{tier} read failed for {full_key}: {e}");
                None
            }
        }
    }
}

fn parse_entry<T: DeserializeOwned>(full_key: &str, raw: &str) -> Option<CacheEntry<T>> {
    match serde_json::from_str(raw) {
        Ok(entry) => Some(entry),
        Err(e) => {
            log::warn!("discarding undecodable cache entry for {full_key}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use dashmap::DashMap;

    use crate::CacheError;

    /// Remote tier stub that records reads and writes.
    #[derive(Default)]
    struct FakeRemote {
        entries: DashMap<String, String>,
    }

    #[async_trait]
    impl CacheBackend for FakeRemote {
        async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
            Ok(self.entries.get(key).map(|v| v.clone()))
        }

        async fn set_raw(
            &self,
            key: &str,
            value: String,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            self.entries.insert(key.to_string(), value);
            Ok(())
        }
    }

    #[tokio::test]
    async fn fresh_entry_hits_then_expires_to_miss() {
        let store = CacheStore::new(None);
        store
            .set(CacheNamespace::MapTile, "15:1:2", &vec![1, 2, 3], Duration::seconds(1))
            .await;

        let (entry, tier) = store
            .get::<Vec<i32>>(CacheNamespace::MapTile, "15:1:2")
            .await
            .unwrap();
        assert_eq!(entry.value, vec![1, 2, 3]);
        assert_eq!(tier, CacheTier::Memory);

        // Re-write already expired: the read must treat it as absent.
        store
            .set(CacheNamespace::MapTile, "15:1:2", &vec![1, 2, 3], Duration::seconds(-1))
            .await;
        assert!(
            store
                .get::<Vec<i32>>(CacheNamespace::MapTile, "15:1:2")
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn snapshot_stale_grace_keeps_expired_entry_readable() {
        let store = CacheStore::new(None);
        store
            .set(CacheNamespace::Snapshot, "42", &"payload", Duration::seconds(-5))
            .await;

        assert!(store.get::<String>(CacheNamespace::Snapshot, "42").await.is_none());

        let (entry, _) = store
            .get_any::<String>(CacheNamespace::Snapshot, "42")
            .await
            .unwrap();
        assert_eq!(entry.value, "payload");
        assert!(!entry.is_fresh(Utc::now()));
    }

    #[tokio::test]
    async fn expired_map_tile_is_gone_even_for_get_any() {
        let store = CacheStore::new(None);
        store
            .set(CacheNamespace::MapTile, "k", &1_u32, Duration::seconds(-5))
            .await;
        assert!(store.get_any::<u32>(CacheNamespace::MapTile, "k").await.is_none());
    }

    #[tokio::test]
    async fn l2_hit_backfills_l1() {
        let remote = Arc::new(FakeRemote::default());
        let store = CacheStore::new(Some(remote.clone()));

        // Seed L2 only, bypassing the store.
        let entry = CacheEntry::new(7_u32, Utc::now(), Duration::minutes(5));
        remote
            .entries
            .insert("tile:k".to_string(), serde_json::to_string(&entry).unwrap());

        let (got, tier) = store.get::<u32>(CacheNamespace::MapTile, "k").await.unwrap();
        assert_eq!(got.value, 7);
        assert_eq!(tier, CacheTier::Redis);

        // Second read comes from L1.
        let (_, tier) = store.get::<u32>(CacheNamespace::MapTile, "k").await.unwrap();
        assert_eq!(tier, CacheTier::Memory);
    }

    #[tokio::test]
    async fn namespaces_do_not_collide() {
        let store = CacheStore::new(None);
        store
            .set(CacheNamespace::MapTile, "k", &"tile", Duration::minutes(5))
            .await;
        store
            .set(CacheNamespace::Address, "k", &"addr", Duration::minutes(5))
            .await;

        let (tile, _) = store.get::<String>(CacheNamespace::MapTile, "k").await.unwrap();
        let (addr, _) = store.get::<String>(CacheNamespace::Address, "k").await.unwrap();
        assert_eq!(tile.value, "tile");
        assert_eq!(addr.value, "addr");
    }

    #[tokio::test]
    async fn undecodable_entries_degrade_to_miss() {
        let store = CacheStore::new(None);
        store
            .local
            .set_raw("tile:k", "not json".to_string(), Duration::minutes(5))
            .await
            .unwrap();
        assert!(store.get::<u32>(CacheNamespace::MapTile, "k").await.is_none());
    }
}
