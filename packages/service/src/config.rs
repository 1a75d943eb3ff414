//! Service tuning knobs, read from the environment with sensible defaults.

use chrono::Duration;

/// TTLs and rate limits for the orchestration layer.
///
/// Every knob has an environment override so retention can be tuned per
/// deployment without a rebuild.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Logical TTL for cached per-tile parcel lists.
    pub map_tile_ttl: Duration,
    /// Logical TTL for successful address-to-parcel mappings.
    pub address_ttl: Duration,
    /// Logical TTL for property snapshots.
    pub snapshot_ttl: Duration,
    /// TTL for cached negative address/lookup results. Much shorter than
    /// the positive TTL: upstream coverage gaps get filled.
    pub negative_lookup_ttl: Duration,
    /// Minimum interval between upstream-visible requests for the same
    /// (caller, tile) pair. Zero disables the gate.
    pub tile_min_interval: Duration,
    /// Half-width in degrees of the bounding box derived for a map-click
    /// lookup. 0.002 degrees is roughly 200 meters.
    pub lookup_box_delta: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            map_tile_ttl: Duration::minutes(30),
            address_ttl: Duration::days(120),
            snapshot_ttl: Duration::days(30),
            negative_lookup_ttl: Duration::hours(1),
            tile_min_interval: Duration::milliseconds(600),
            lookup_box_delta: 0.002,
        }
    }
}

impl ServiceConfig {
    /// Reads overrides from the environment, falling back to defaults for
    /// anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            map_tile_ttl: env_seconds("MAP_TILE_TTL_SECONDS", defaults.map_tile_ttl),
            address_ttl: env_seconds("ADDRESS_TTL_SECONDS", defaults.address_ttl),
            snapshot_ttl: env_seconds("SNAPSHOT_TTL_SECONDS", defaults.snapshot_ttl),
            negative_lookup_ttl: env_seconds(
                "NEGATIVE_LOOKUP_TTL_SECONDS",
                defaults.negative_lookup_ttl,
            ),
            tile_min_interval: env_millis("TILE_MIN_INTERVAL_MS", defaults.tile_min_interval),
            lookup_box_delta: env_f64("LOOKUP_BOX_DELTA", defaults.lookup_box_delta),
        }
    }
}

fn env_seconds(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .map_or(default, Duration::seconds)
}

fn env_millis(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .map_or(default, Duration::milliseconds)
}

fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}
