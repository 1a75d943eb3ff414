#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical record types produced by the property-data normalization layer.
//!
//! The upstream API returns heterogeneously-shaped JSON; everything the rest
//! of the system touches is one of the fixed shapes in this crate. Records
//! are serialized to JSON both for the REST API (camelCase) and for cache
//! storage, so the serde form is part of the contract.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// A geographic viewport, in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Northern latitude edge.
    pub north: f64,
    /// Southern latitude edge.
    pub south: f64,
    /// Eastern longitude edge.
    pub east: f64,
    /// Western longitude edge.
    pub west: f64,
}

impl Bounds {
    /// Creates a bounding box from its four edges.
    #[must_use]
    pub const fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// A small fixed-size box around a point, used when resolving a map
    /// click where the caller already knows exactly which property they
    /// mean. A delta of 0.002 degrees is roughly 200 meters.
    #[must_use]
    pub const fn around_point(lat: f64, lng: f64, delta: f64) -> Self {
        Self {
            north: lat + delta,
            south: lat - delta,
            east: lng + delta,
            west: lng - delta,
        }
    }

    /// Center point as `(latitude, longitude)`.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        ((self.north + self.south) / 2.0, (self.east + self.west) / 2.0)
    }
}

/// Coordinates preserved alongside a cached snapshot so a stale record can
/// refresh itself without the caller re-supplying location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationHint {
    /// Latitude used for the original fetch.
    pub latitude: f64,
    /// Longitude used for the original fetch.
    pub longitude: f64,
}

/// One property as shown on the map at low zoom.
///
/// Coordinates are the only hard requirement: the normalizer drops any
/// upstream record whose coordinates cannot be resolved, so a
/// `ParcelRecord` never carries null lat/lng. Every other field degrades to
/// `None` under missing upstream data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelRecord {
    /// Display label; `"Address unknown"` when upstream has nothing usable.
    pub address: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Upstream identifier, or a synthetic `p-{index}` when upstream omits
    /// one.
    pub external_id: String,
    /// Upstream property type label.
    pub property_type: Option<String>,
    /// Bedroom count.
    pub beds: Option<f64>,
    /// Bathroom count (upstream reports half-baths fractionally).
    pub baths: Option<f64>,
    /// Living area in square feet.
    pub square_feet: Option<f64>,
}

/// A parcel resolved from a typed address or map click, with valuation and
/// last-sale context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressParcelRecord {
    /// Display label.
    pub address: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Upstream identifier.
    pub external_id: String,
    /// Upstream property type label.
    pub property_type: Option<String>,
    /// Bedroom count.
    pub beds: Option<f64>,
    /// Bathroom count.
    pub baths: Option<f64>,
    /// Living area in square feet.
    pub square_feet: Option<f64>,
    /// Automated valuation model estimate, in dollars.
    pub estimate: Option<f64>,
    /// Most recent sale price, in dollars.
    pub last_sale_price: Option<f64>,
    /// Most recent sale date, in the upstream's native string format
    /// (never reparsed).
    pub last_sale_date: Option<String>,
}

/// The seven independently-aged categories of a property snapshot.
///
/// Fetched together in one upstream call but assigned separate staleness
/// horizons: distress and valuation signals age in days, physical facts in
/// months.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum SectionName {
    /// Physical characteristics (beds, baths, year built).
    Physical,
    /// Ownership and deed history.
    Ownership,
    /// Mortgage and financing records.
    Mortgage,
    /// Prior sale events.
    SalesHistory,
    /// Automated valuation and equity.
    Valuation,
    /// Tax assessment.
    Tax,
    /// Foreclosure and default indicators.
    Distress,
}

impl SectionName {
    /// Staleness horizon for this section, reflecting how often the
    /// underlying facts actually change.
    #[must_use]
    pub const fn default_ttl(self) -> Duration {
        match self {
            Self::Valuation | Self::Distress => Duration::days(3),
            Self::Ownership | Self::Mortgage | Self::SalesHistory => Duration::days(60),
            Self::Tax | Self::Physical => Duration::days(90),
        }
    }
}

/// Bookkeeping stored alongside a snapshot payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    /// Per-section staleness horizons, stamped at fetch time.
    pub section_expiry: BTreeMap<SectionName, DateTime<Utc>>,
    /// Coordinates used for the fetch, kept so a stale record can
    /// self-refresh.
    pub hint: Option<LocationHint>,
}

/// The full upstream payload for one property plus expiry bookkeeping.
///
/// The payload is stored verbatim; section-specific normalization happens on
/// read, so one cached snapshot serves every section consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    /// Upstream property identifier.
    pub external_id: String,
    /// Opaque upstream JSON, stored unmodified.
    pub payload: serde_json::Value,
    /// When the payload was fetched.
    pub fetched_at: DateTime<Utc>,
    /// Whole-record staleness horizon.
    pub expires_at: DateTime<Utc>,
    /// Section expiry map and refetch hint.
    pub meta: SnapshotMeta,
}

impl SnapshotRecord {
    /// Builds a snapshot record fetched at `now`, stamping every section
    /// with its own expiry.
    #[must_use]
    pub fn new(
        external_id: String,
        payload: serde_json::Value,
        now: DateTime<Utc>,
        ttl: Duration,
        hint: Option<LocationHint>,
    ) -> Self {
        use strum::IntoEnumIterator as _;

        let section_expiry = SectionName::iter()
            .map(|section| (section, now + section.default_ttl()))
            .collect();

        Self {
            external_id,
            payload,
            fetched_at: now,
            expires_at: now + ttl,
            meta: SnapshotMeta {
                section_expiry,
                hint,
            },
        }
    }

    /// Whether the whole record is still fresh at `now`.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Physical characteristics of a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalSection {
    /// Property type label.
    pub property_type: Option<String>,
    /// Year of construction.
    pub year_built: Option<f64>,
    /// Bedroom count.
    pub beds: Option<f64>,
    /// Bathroom count.
    pub baths: Option<f64>,
    /// Living area in square feet.
    pub square_feet: Option<f64>,
    /// Lot size in acres.
    pub lot_size_acres: Option<f64>,
    /// Number of stories.
    pub stories: Option<f64>,
}

/// One transfer in the ownership chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipTransfer {
    /// Receiving party.
    pub grantee: Option<String>,
    /// Conveying party.
    pub grantor: Option<String>,
    /// Recording date, upstream string format.
    pub record_date: Option<String>,
    /// Deed instrument type.
    pub deed_type: Option<String>,
}

/// Ownership and deed history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipSection {
    /// Current owner name.
    pub owner: Option<String>,
    /// Most recent deed instrument type.
    pub deed_type: Option<String>,
    /// Whether the owner occupies the property.
    pub owner_occupied: Option<bool>,
    /// Transfer chain, newest first; `None` when upstream has no usable
    /// entries.
    pub chain: Option<Vec<OwnershipTransfer>>,
}

/// One mortgage or financing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MortgageRecord {
    /// Lending institution.
    pub lender: Option<String>,
    /// Loan amount in dollars.
    pub amount: Option<f64>,
    /// Recording date, upstream string format.
    pub record_date: Option<String>,
    /// Loan type label.
    pub loan_type: Option<String>,
}

/// Mortgage and financing history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MortgageSection {
    /// Financing records, newest first.
    pub records: Vec<MortgageRecord>,
}

/// One prior sale event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleEvent {
    /// Sale price in dollars.
    pub price: Option<f64>,
    /// Sale date, upstream string format.
    pub date: Option<String>,
    /// Transaction type label.
    pub transaction_type: Option<String>,
}

/// Sales history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesHistorySection {
    /// Sale events, newest first.
    pub sales: Vec<SaleEvent>,
}

/// Automated valuation and equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationSection {
    /// AVM point estimate in dollars.
    pub estimate: Option<f64>,
    /// AVM high bound.
    pub high: Option<f64>,
    /// AVM low bound.
    pub low: Option<f64>,
    /// AVM confidence score.
    pub confidence: Option<f64>,
    /// Estimated owner equity in dollars.
    pub equity: Option<f64>,
}

/// Tax assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxSection {
    /// Assessed total value in dollars.
    pub assessed_value: Option<f64>,
    /// Market total value in dollars.
    pub market_value: Option<f64>,
    /// Annual tax amount in dollars.
    pub tax_amount: Option<f64>,
    /// Assessment year.
    pub tax_year: Option<f64>,
}

/// One foreclosure or default filing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistressFiling {
    /// Filing type label.
    pub filing_type: Option<String>,
    /// Recording date, upstream string format.
    pub record_date: Option<String>,
    /// Default or judgment amount in dollars.
    pub amount: Option<f64>,
}

/// Foreclosure and default indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistressSection {
    /// Foreclosure filings, newest first; `None` when there are none.
    pub filings: Option<Vec<DistressFiling>>,
    /// Whether an active default indicator is present.
    pub in_default: Option<bool>,
}

/// The seven-way decomposition of a snapshot payload.
///
/// A section is `None` when none of its candidate upstream fields are
/// present — consumers use section presence, not per-field presence, to
/// decide whether to render a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSections {
    /// Physical characteristics.
    pub physical: Option<PhysicalSection>,
    /// Ownership and deed history.
    pub ownership: Option<OwnershipSection>,
    /// Mortgage and financing history.
    pub mortgage: Option<MortgageSection>,
    /// Prior sale events.
    pub sales_history: Option<SalesHistorySection>,
    /// Automated valuation and equity.
    pub valuation: Option<ValuationSection>,
    /// Tax assessment.
    pub tax: Option<TaxSection>,
    /// Foreclosure and default indicators.
    pub distress: Option<DistressSection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_center_is_midpoint() {
        let bounds = Bounds::new(40.71, 40.70, -73.99, -74.01);
        let (lat, lng) = bounds.center();
        assert!((lat - 40.705).abs() < 1e-9);
        assert!((lng - -74.0).abs() < 1e-9);
    }

    #[test]
    fn bounds_around_point_is_symmetric() {
        let bounds = Bounds::around_point(40.7, -74.0, 0.002);
        assert!((bounds.north - 40.702).abs() < 1e-9);
        assert!((bounds.south - 40.698).abs() < 1e-9);
        assert!((bounds.east - -73.998).abs() < 1e-9);
        assert!((bounds.west - -74.002).abs() < 1e-9);
    }

    #[test]
    fn section_ttls_order_by_volatility() {
        assert!(SectionName::Distress.default_ttl() < SectionName::Ownership.default_ttl());
        assert!(SectionName::Ownership.default_ttl() < SectionName::Physical.default_ttl());
        assert_eq!(
            SectionName::Valuation.default_ttl(),
            SectionName::Distress.default_ttl()
        );
    }

    #[test]
    fn section_name_serializes_camel_case() {
        let json = serde_json::to_string(&SectionName::SalesHistory).unwrap();
        assert_eq!(json, "\"salesHistory\"");
        assert_eq!(SectionName::SalesHistory.to_string(), "salesHistory");
    }

    #[test]
    fn snapshot_record_stamps_every_section() {
        let now = Utc::now();
        let record = SnapshotRecord::new(
            "123".to_string(),
            serde_json::json!({}),
            now,
            Duration::days(30),
            None,
        );
        assert_eq!(record.meta.section_expiry.len(), 7);
        assert_eq!(
            record.meta.section_expiry[&SectionName::Valuation],
            now + Duration::days(3)
        );
        assert!(record.is_fresh(now));
        assert!(!record.is_fresh(now + Duration::days(31)));
    }

    #[test]
    fn snapshot_record_round_trips_through_json() {
        let now = Utc::now();
        let record = SnapshotRecord::new(
            "42".to_string(),
            serde_json::json!({"property": [{"identifier": {"Id": 42}}]}),
            now,
            Duration::days(30),
            Some(LocationHint {
                latitude: 40.7,
                longitude: -74.0,
            }),
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: SnapshotRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
