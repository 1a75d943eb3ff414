#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Web-Mercator tiling and viewport radius math.
//!
//! Pure arithmetic used by the caching layer to bucket map requests into
//! discrete slippery-map tiles and to derive a point-radius query from a
//! rectangular viewport. Tiles are cache-bucketing keys only — nothing here
//! renders or indexes geometry.

use std::fmt;

/// Smallest radius the upstream property API accepts, in miles.
pub const MIN_RADIUS_MILES: f64 = 0.25;

/// Largest radius the upstream property API accepts, in miles.
pub const MAX_RADIUS_MILES: f64 = 20.0;

/// Miles per degree of latitude (flat-earth approximation).
const MILES_PER_DEGREE: f64 = 69.0;

/// A discrete cell of the standard slippery-map tiling scheme.
///
/// Derived deterministically from a `(lat, lng, zoom)` triple; the string
/// form `"zoom:x:y"` is used directly as a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Map zoom level.
    pub zoom: u8,
    /// Tile column.
    pub x: i64,
    /// Tile row.
    pub y: i64,
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.zoom, self.x, self.y)
    }
}

/// Computes the slippery-map tile containing a point at the given zoom.
///
/// Standard Web-Mercator formula:
/// `x = floor(((lng + 180) / 360) * 2^zoom)`,
/// `y = floor(((1 - ln(tan(lat) + sec(lat)) / pi) / 2) * 2^zoom)`.
///
/// Zoom is not range-checked; callers pass sane UI zoom levels (4–20).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn tile_key_for_point(lat: f64, lng: f64, zoom: u8) -> TileKey {
    let n = 2_f64.powi(i32::from(zoom));
    let lat_rad = lat.to_radians();

    let x = (((lng + 180.0) / 360.0) * n).floor() as i64;
    let y = (((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0)
        * n)
        .floor() as i64;

    TileKey { zoom, x, y }
}

/// Derives a point-radius search distance approximating a viewport's
/// half-diagonal, in miles.
///
/// Longitude degrees shrink by `cos(latitude)` away from the equator, so the
/// east–west span is scaled before taking the larger dimension. The result
/// is clamped to [`MIN_RADIUS_MILES`, `MAX_RADIUS_MILES`] — the range the
/// upstream API accepts. Degenerate boxes (`north == south`, `east == west`)
/// clamp up to the floor rather than erroring.
#[must_use]
pub fn radius_miles_for_bounds(north: f64, south: f64, east: f64, west: f64) -> f64 {
    let center_lat = ((north + south) / 2.0).to_radians();
    let lat_degrees = north - south;
    let lng_degrees = (east - west).abs() * center_lat.cos();

    let radius = MILES_PER_DEGREE * 0.5 * lat_degrees.max(lng_degrees);
    radius.clamp(MIN_RADIUS_MILES, MAX_RADIUS_MILES)
}
