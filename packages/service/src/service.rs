//! The three orchestration operations: map parcels, address resolution, and
//! property snapshots.
//!
//! Shared shape: check the cache, coalesce identical concurrent fetches,
//! re-check the cache inside the flight (a peer may have settled between
//! the first check and flight start), fetch, normalize, write back. The
//! coalescer registry is process-local; the shared cache is what keeps
//! separate instances from duplicating upstream work.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parcel_map_attom::{PropertyApi, normalize, sections};
use parcel_map_attom_models::{
    AddressParcelRecord, Bounds, LocationHint, ParcelRecord, SectionName, SnapshotRecord,
    SnapshotSections,
};
use parcel_map_cache::{CacheNamespace, CacheStore};
use parcel_map_singleflight::Coalescer;
use parcel_map_tiling::tile_key_for_point;
use serde::Serialize;

use crate::{CacheStatus, ServiceConfig, ServiceError};

/// Parcels for one map viewport.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapParcels {
    /// Map-pin records, coordinate-less upstream items already dropped.
    pub parcels: Vec<ParcelRecord>,
    /// How this response was satisfied.
    pub cache: CacheStatus,
}

/// Result of an address or map-click resolution. `parcel: None` is a real
/// answer (upstream has no coverage there) and is itself cached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedParcel {
    /// Best-matching parcel, if any survived normalization.
    pub parcel: Option<AddressParcelRecord>,
    /// How this response was satisfied.
    pub cache: CacheStatus,
}

/// A property snapshot decomposed into its seven sections.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySnapshot {
    /// Upstream property identifier.
    pub external_id: String,
    /// The seven-way section decomposition, each independently optional.
    pub sections: SnapshotSections,
    /// Per-section staleness horizons stamped at fetch time.
    pub section_expiry: BTreeMap<SectionName, DateTime<Utc>>,
    /// When the underlying payload was fetched.
    pub fetched_at: DateTime<Utc>,
    /// How this response was satisfied.
    pub cache: CacheStatus,
}

/// Orchestrates upstream fetches, normalization, caching, and coalescing.
///
/// Constructed once per process and shared as an `Arc`; the operations take
/// `self: &Arc<Self>` because coalesced flights and background refreshes
/// outlive the originating request.
pub struct ParcelService {
    api: Arc<dyn PropertyApi>,
    cache: CacheStore,
    config: ServiceConfig,
    tile_flights: Coalescer<Vec<ParcelRecord>, ServiceError>,
    lookup_flights: Coalescer<Option<AddressParcelRecord>, ServiceError>,
    snapshot_flights: Coalescer<SnapshotRecord, ServiceError>,
    tile_gate: DashMap<String, DateTime<Utc>>,
}

impl ParcelService {
    #[must_use]
    pub fn new(api: Arc<dyn PropertyApi>, cache: CacheStore, config: ServiceConfig) -> Arc<Self> {
        Arc::new(Self {
            api,
            cache,
            config,
            tile_flights: Coalescer::new(),
            lookup_flights: Coalescer::new(),
            snapshot_flights: Coalescer::new(),
            tile_gate: DashMap::new(),
        })
    }

    /// Parcels for a map viewport, keyed by the tile containing the
    /// viewport center.
    ///
    /// Best-effort: an upstream failure degrades to an empty list rather
    /// than failing the map. Repeat requests from the same caller for the
    /// same tile inside the minimum interval are suppressed outright.
    pub async fn get_map_parcels(
        self: &Arc<Self>,
        bounds: Bounds,
        zoom: u8,
        caller: &str,
    ) -> MapParcels {
        let (lat, lng) = bounds.center();
        let tile_key = tile_key_for_point(lat, lng, zoom).to_string();

        if !self.tile_gate_allows(caller, &tile_key) {
            log::debug!("suppressed repeat tile request from {caller} for {tile_key}");
            return MapParcels {
                parcels: Vec::new(),
                cache: CacheStatus::RateLimited,
            };
        }

        if let Some((entry, tier)) = self
            .cache
            .get::<Vec<ParcelRecord>>(CacheNamespace::MapTile, &tile_key)
            .await
        {
            return MapParcels {
                parcels: entry.value,
                cache: tier.into(),
            };
        }

        let this = Arc::clone(self);
        let work_key = tile_key.clone();
        let (result, joined) = self
            .tile_flights
            .run(&format!("tile:{tile_key}"), async move {
                if let Some((entry, _)) = this
                    .cache
                    .get::<Vec<ParcelRecord>>(CacheNamespace::MapTile, &work_key)
                    .await
                {
                    return Ok(entry.value);
                }
                let payload = this.api.fetch_snapshot_for_bounds(&bounds).await?;
                let parcels = normalize::normalize_parcel_list(&payload);
                this.cache
                    .set(
                        CacheNamespace::MapTile,
                        &work_key,
                        &parcels,
                        this.config.map_tile_ttl,
                    )
                    .await;
                Ok(parcels)
            })
            .await;

        match result {
            Ok(parcels) => MapParcels {
                parcels,
                cache: if joined {
                    CacheStatus::Singleflight
                } else {
                    CacheStatus::Miss
                },
            },
            Err(err) => {
                log::warn!("parcel fetch for tile {tile_key} failed, serving empty list: {err}");
                MapParcels {
                    parcels: Vec::new(),
                    cache: CacheStatus::Miss,
                }
            }
        }
    }

    /// Resolves a typed address against the given viewport.
    ///
    /// # Errors
    ///
    /// Propagates configuration and upstream failures; a no-match is
    /// `Ok` with `parcel: None`.
    pub async fn resolve_address(
        self: &Arc<Self>,
        address: &str,
        bounds: Bounds,
    ) -> Result<ResolvedParcel, ServiceError> {
        let normalized = normalize::normalize_address_text(address);
        let cache_key = if normalized.is_empty() {
            let (lat, lng) = bounds.center();
            latlng_key(lat, lng)
        } else {
            normalized
        };
        self.resolve_cached(cache_key, bounds, Some(address.to_string()))
            .await
    }

    /// Resolves a map click to its parcel, deriving a small bounding box
    /// around the clicked point. An accompanying address, when present,
    /// steers best-match selection and keys the cache.
    ///
    /// # Errors
    ///
    /// Propagates configuration and upstream failures.
    pub async fn lookup_by_location(
        self: &Arc<Self>,
        lat: f64,
        lng: f64,
        address: Option<&str>,
    ) -> Result<ResolvedParcel, ServiceError> {
        let cache_key = address
            .map(normalize::normalize_address_text)
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| latlng_key(lat, lng));
        let bounds = Bounds::around_point(lat, lng, self.config.lookup_box_delta);
        self.resolve_cached(cache_key, bounds, address.map(String::from))
            .await
    }

    /// The seven-section snapshot for one property.
    ///
    /// A fresh cached record is returned as-is. A logically-expired record
    /// is served immediately tagged stale while a background refresh runs.
    /// A true miss fetches inline, which requires coordinates from the
    /// caller.
    ///
    /// # Errors
    ///
    /// [`ServiceError::MissingLocation`] when nothing is cached and no
    /// coordinates were supplied; otherwise propagates upstream failures.
    pub async fn get_property_snapshot(
        self: &Arc<Self>,
        external_id: &str,
        lat: Option<f64>,
        lng: Option<f64>,
    ) -> Result<PropertySnapshot, ServiceError> {
        let now = Utc::now();

        if let Some((entry, tier)) = self
            .cache
            .get_any::<SnapshotRecord>(CacheNamespace::Snapshot, external_id)
            .await
        {
            let record = entry.value;
            if record.is_fresh(now) {
                return Ok(snapshot_response(record, tier.into()));
            }

            let hint = record.meta.hint.or(match (lat, lng) {
                (Some(latitude), Some(longitude)) => Some(LocationHint {
                    latitude,
                    longitude,
                }),
                _ => None,
            });
            if let Some(hint) = hint {
                self.spawn_snapshot_refresh(external_id.to_string(), hint);
            } else {
                log::warn!("stale snapshot {external_id} has no coordinates to refresh with");
            }
            return Ok(snapshot_response(record, CacheStatus::Stale));
        }

        let (Some(latitude), Some(longitude)) = (lat, lng) else {
            return Err(ServiceError::MissingLocation);
        };

        let this = Arc::clone(self);
        let id = external_id.to_string();
        let (result, joined) = self
            .snapshot_flights
            .run(&format!("snap:{external_id}"), async move {
                if let Some((entry, _)) = this
                    .cache
                    .get::<SnapshotRecord>(CacheNamespace::Snapshot, &id)
                    .await
                {
                    return Ok(entry.value);
                }
                Self::fetch_and_store_snapshot(
                    &this,
                    id,
                    LocationHint {
                        latitude,
                        longitude,
                    },
                )
                .await
            })
            .await;

        match result {
            Ok(record) => Ok(snapshot_response(
                record,
                if joined {
                    CacheStatus::Singleflight
                } else {
                    CacheStatus::Miss
                },
            )),
            Err(err) => Err((*err).clone()),
        }
    }

    /// Per-(caller, tile) minimum-interval gate. A `true` result records
    /// the request time.
    fn tile_gate_allows(&self, caller: &str, tile_key: &str) -> bool {
        if self.config.tile_min_interval <= Duration::zero() {
            return true;
        }
        let now = Utc::now();
        // Aged-out entries can never suppress a request again, so drop them
        // here rather than letting the map grow with every caller/tile pair.
        self.tile_gate
            .retain(|_, last| now - *last < self.config.tile_min_interval);
        match self.tile_gate.entry(format!("{caller}|{tile_key}")) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    async fn resolve_cached(
        self: &Arc<Self>,
        cache_key: String,
        bounds: Bounds,
        target: Option<String>,
    ) -> Result<ResolvedParcel, ServiceError> {
        if let Some((entry, tier)) = self
            .cache
            .get::<Option<AddressParcelRecord>>(CacheNamespace::Address, &cache_key)
            .await
        {
            return Ok(ResolvedParcel {
                parcel: entry.value,
                cache: tier.into(),
            });
        }

        let this = Arc::clone(self);
        let work_key = cache_key.clone();
        let (result, joined) = self
            .lookup_flights
            .run(&format!("addr:{cache_key}"), async move {
                if let Some((entry, _)) = this
                    .cache
                    .get::<Option<AddressParcelRecord>>(CacheNamespace::Address, &work_key)
                    .await
                {
                    return Ok(entry.value);
                }

                let payload = this.api.fetch_snapshot_for_bounds(&bounds).await?;
                let best = normalize::resolve_best_match(&payload, target.as_deref());

                // A resolved parcel's raw payload is a complete snapshot;
                // store it now so the follow-up snapshot request is free.
                if let Some(parcel) = &best {
                    this.store_snapshot_for_match(&payload, parcel).await;
                }

                let ttl = if best.is_some() {
                    this.config.address_ttl
                } else {
                    this.config.negative_lookup_ttl
                };
                this.cache
                    .set(CacheNamespace::Address, &work_key, &best, ttl)
                    .await;
                Ok(best)
            })
            .await;

        match result {
            Ok(parcel) => Ok(ResolvedParcel {
                parcel,
                cache: if joined {
                    CacheStatus::Singleflight
                } else {
                    CacheStatus::Miss
                },
            }),
            Err(err) => Err((*err).clone()),
        }
    }

    async fn store_snapshot_for_match(
        &self,
        payload: &serde_json::Value,
        parcel: &AddressParcelRecord,
    ) {
        let Some(item) = normalize::property_item_for_id(payload, &parcel.external_id) else {
            return;
        };
        let hint = LocationHint {
            latitude: parcel.latitude,
            longitude: parcel.longitude,
        };
        let record = SnapshotRecord::new(
            parcel.external_id.clone(),
            item.clone(),
            Utc::now(),
            self.config.snapshot_ttl,
            Some(hint),
        );
        self.cache
            .set(
                CacheNamespace::Snapshot,
                &record.external_id,
                &record,
                self.config.snapshot_ttl,
            )
            .await;
    }

    /// Fire-and-forget refresh of a stale snapshot. Failures are logged and
    /// never reach the caller who triggered the refresh.
    fn spawn_snapshot_refresh(self: &Arc<Self>, external_id: String, hint: LocationHint) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let flight_key = format!("snap-refresh:{external_id}");
            let worker = Arc::clone(&this);
            let id = external_id.clone();
            let (result, _) = this
                .snapshot_flights
                .run(&flight_key, async move {
                    Self::fetch_and_store_snapshot(&worker, id, hint).await
                })
                .await;
            if let Err(err) = result {
                log::warn!("background snapshot refresh for {external_id} failed: {err}");
            }
        });
    }

    async fn fetch_and_store_snapshot(
        this: &Arc<Self>,
        external_id: String,
        hint: LocationHint,
    ) -> Result<SnapshotRecord, ServiceError> {
        let bounds = Bounds::around_point(hint.latitude, hint.longitude, this.config.lookup_box_delta);
        let payload = this.api.fetch_snapshot_for_bounds(&bounds).await?;

        let item = normalize::property_item_for_id(&payload, &external_id)
            .or_else(|| normalize::first_property(&payload))
            .cloned();
        let item = item.unwrap_or(payload);

        let record = SnapshotRecord::new(
            external_id,
            item,
            Utc::now(),
            this.config.snapshot_ttl,
            Some(hint),
        );
        this.cache
            .set(
                CacheNamespace::Snapshot,
                &record.external_id,
                &record,
                this.config.snapshot_ttl,
            )
            .await;
        Ok(record)
    }
}

fn latlng_key(lat: f64, lng: f64) -> String {
    format!("ll:{lat:.6},{lng:.6}")
}

fn snapshot_response(record: SnapshotRecord, cache: CacheStatus) -> PropertySnapshot {
    let property = normalize::first_property(&record.payload);
    let sections = sections::normalize_snapshot_sections(property.unwrap_or(&record.payload));
    PropertySnapshot {
        external_id: record.external_id,
        sections,
        section_expiry: record.meta.section_expiry,
        fetched_at: record.fetched_at,
        cache,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use parcel_map_attom::AttomError;
    use serde_json::{Value, json};

    use super::*;

    struct StubApi {
        payload: Value,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubApi {
        fn new(payload: Value) -> Self {
            Self {
                payload,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                payload: Value::Null,
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PropertyApi for StubApi {
        async fn fetch_snapshot_for_bounds(
            &self,
            _bounds: &Bounds,
        ) -> Result<Value, AttomError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AttomError::UpstreamStatus {
                    status: 503,
                    body_excerpt: "unavailable".to_string(),
                });
            }
            Ok(self.payload.clone())
        }
    }

    fn ungated_config() -> ServiceConfig {
        ServiceConfig {
            tile_min_interval: Duration::zero(),
            ..ServiceConfig::default()
        }
    }

    fn service_with(
        payload: Value,
        config: ServiceConfig,
    ) -> (Arc<ParcelService>, Arc<StubApi>) {
        let api = Arc::new(StubApi::new(payload));
        let service = ParcelService::new(api.clone(), CacheStore::new(None), config);
        (service, api)
    }

    fn property(address: &str, lat: f64, lng: f64, id: u64) -> Value {
        json!({
            "identifier": {"Id": id},
            "address": {"line1": address, "locality": "Springfield"},
            "location": {"latitude": lat, "longitude": lng},
            "assessment": {"tax": {"taxamt": 4100, "taxyear": 2024}}
        })
    }

    fn viewport() -> Bounds {
        Bounds::new(40.72, 40.70, -74.00, -74.02)
    }

    #[tokio::test]
    async fn map_parcels_drops_bad_records_and_caches() {
        let payload = json!({"property": [
            property("1 Main St", 40.71, -74.01, 1),
            property("2 Main St", 40.711, -74.011, 2),
            {"address": {"line1": "no coordinates"}},
        ]});
        let (service, api) = service_with(payload, ungated_config());

        let first = service.get_map_parcels(viewport(), 15, "client-a").await;
        assert_eq!(first.parcels.len(), 2);
        assert_eq!(first.cache, CacheStatus::Miss);
        assert_eq!(api.calls(), 1);

        let second = service.get_map_parcels(viewport(), 15, "client-a").await;
        assert_eq!(second.parcels.len(), 2);
        assert_eq!(second.cache, CacheStatus::Memory);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn map_parcels_gate_suppresses_rapid_repeats_per_caller() {
        let payload = json!({"property": [property("1 Main St", 40.71, -74.01, 1)]});
        let (service, api) = service_with(payload, ServiceConfig::default());

        let first = service.get_map_parcels(viewport(), 15, "client-a").await;
        assert_eq!(first.cache, CacheStatus::Miss);

        let repeat = service.get_map_parcels(viewport(), 15, "client-a").await;
        assert_eq!(repeat.cache, CacheStatus::RateLimited);
        assert!(repeat.parcels.is_empty());

        // A different caller for the same tile is served from cache.
        let other = service.get_map_parcels(viewport(), 15, "client-b").await;
        assert_eq!(other.cache, CacheStatus::Memory);
        assert_eq!(other.parcels.len(), 1);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn tile_gate_drops_aged_out_entries() {
        let payload = json!({"property": [property("1 Main St", 40.71, -74.01, 1)]});
        let config = ServiceConfig {
            tile_min_interval: Duration::milliseconds(20),
            ..ServiceConfig::default()
        };
        let (service, _api) = service_with(payload, config);

        service.get_map_parcels(viewport(), 15, "client-a").await;
        service.get_map_parcels(viewport(), 15, "client-b").await;
        assert_eq!(service.tile_gate.len(), 2);

        tokio::time::sleep(StdDuration::from_millis(30)).await;

        // The next request prunes both aged-out entries before recording
        // its own, so the map holds only the live caller.
        service.get_map_parcels(viewport(), 15, "client-c").await;
        assert_eq!(service.tile_gate.len(), 1);
        assert!(service.tile_gate.contains_key(&format!(
            "client-c|{}",
            tile_key_for_point(40.71, -74.01, 15)
        )));
    }

    #[tokio::test]
    async fn map_parcels_degrades_to_empty_on_upstream_failure() {
        let api = Arc::new(StubApi::failing());
        let service = ParcelService::new(api.clone(), CacheStore::new(None), ungated_config());

        let result = service.get_map_parcels(viewport(), 15, "client-a").await;
        assert!(result.parcels.is_empty());
        assert_eq!(result.cache, CacheStatus::Miss);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn resolve_address_propagates_upstream_failure() {
        let api = Arc::new(StubApi::failing());
        let service = ParcelService::new(api.clone(), CacheStore::new(None), ungated_config());

        let err = service
            .resolve_address("1 Main St", viewport())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Upstream { status: 503, .. }));
    }

    #[tokio::test]
    async fn resolve_address_caches_negative_results() {
        let (service, api) = service_with(json!({"property": []}), ungated_config());

        let first = service
            .resolve_address("1 Main St, Springfield", viewport())
            .await
            .unwrap();
        assert!(first.parcel.is_none());
        assert_eq!(first.cache, CacheStatus::Miss);
        assert_eq!(api.calls(), 1);

        let second = service
            .resolve_address("1 Main St, Springfield", viewport())
            .await
            .unwrap();
        assert!(second.parcel.is_none());
        assert_eq!(second.cache, CacheStatus::Memory);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn resolution_piggy_backs_the_snapshot() {
        let payload = json!({"property": [
            property("1 Main St", 40.71, -74.01, 17),
            property("2 Main St", 40.711, -74.011, 18),
        ]});
        let (service, api) = service_with(payload, ungated_config());

        let resolved = service
            .resolve_address("2 Main St", viewport())
            .await
            .unwrap();
        let parcel = resolved.parcel.unwrap();
        assert_eq!(parcel.external_id, "18");
        assert_eq!(api.calls(), 1);

        // The matched property's snapshot is already cached.
        let snapshot = service
            .get_property_snapshot("18", None, None)
            .await
            .unwrap();
        assert_eq!(snapshot.external_id, "18");
        assert_eq!(snapshot.cache, CacheStatus::Memory);
        assert!(snapshot.sections.tax.is_some());
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn lookup_by_location_uses_latlng_key_without_address() {
        let payload = json!({"property": [property("1 Main St", 40.71, -74.01, 1)]});
        let (service, api) = service_with(payload, ungated_config());

        let first = service.lookup_by_location(40.71, -74.01, None).await.unwrap();
        assert_eq!(first.parcel.unwrap().external_id, "1");
        assert_eq!(first.cache, CacheStatus::Miss);

        let second = service.lookup_by_location(40.71, -74.01, None).await.unwrap();
        assert_eq!(second.cache, CacheStatus::Memory);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn snapshot_miss_without_coordinates_is_missing_location() {
        let (service, api) = service_with(json!({"property": []}), ungated_config());

        let err = service
            .get_property_snapshot("99", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MissingLocation));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn snapshot_miss_with_coordinates_fetches_and_caches() {
        let payload = json!({"property": [property("1 Main St", 40.71, -74.01, 7)]});
        let (service, api) = service_with(payload, ungated_config());

        let first = service
            .get_property_snapshot("7", Some(40.71), Some(-74.01))
            .await
            .unwrap();
        assert_eq!(first.cache, CacheStatus::Miss);
        assert!(first.sections.tax.is_some());
        assert_eq!(first.section_expiry.len(), 7);
        assert_eq!(api.calls(), 1);

        let second = service.get_property_snapshot("7", None, None).await.unwrap();
        assert_eq!(second.cache, CacheStatus::Memory);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn stale_snapshot_served_immediately_and_refreshed_in_background() {
        let payload = json!({"property": [property("1 Main St", 40.71, -74.01, 7)]});
        let (service, api) = service_with(payload, ungated_config());

        // Seed a logically-expired record; the snapshot namespace's stale
        // grace keeps it physically readable.
        let stale = SnapshotRecord::new(
            "7".to_string(),
            property("1 Main St", 40.71, -74.01, 7),
            Utc::now() - Duration::days(40),
            Duration::days(30),
            Some(LocationHint {
                latitude: 40.71,
                longitude: -74.01,
            }),
        );
        service
            .cache
            .set(CacheNamespace::Snapshot, "7", &stale, Duration::days(-10))
            .await;

        let served = service.get_property_snapshot("7", None, None).await.unwrap();
        assert_eq!(served.cache, CacheStatus::Stale);
        assert_eq!(served.external_id, "7");

        // Let the background refresh land.
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        assert_eq!(api.calls(), 1);

        let refreshed = service.get_property_snapshot("7", None, None).await.unwrap();
        assert_eq!(refreshed.cache, CacheStatus::Memory);
        assert!(refreshed.fetched_at > served.fetched_at);
        assert_eq!(api.calls(), 1);
    }
}
