//! Property-list normalization and best-match selection.
//!
//! Maps upstream per-property JSON into [`ParcelRecord`] /
//! [`AddressParcelRecord`]. Coordinates are the one hard requirement: a
//! property that cannot be placed on a map is not a parcel record at all,
//! not a partial one. All other fields degrade to `None`.

use parcel_map_attom_models::{AddressParcelRecord, ParcelRecord};
use serde_json::Value;

use crate::extract::{first_f64, first_f64_lenient, first_id, first_str};

/// Label used when upstream has no address-like fields at all. The UI must
/// always have something renderable.
pub const ADDRESS_UNKNOWN: &str = "Address unknown";

const LINE_PATHS: &[&str] = &["address.line1", "address.line2", "line1", "line2"];
const LOCALITY_PATHS: &[&str] = &["address.locality", "locality"];
const REGION_PATHS: &[&str] = &[
    "address.adminArea",
    "address.region",
    "address.countrySubd",
    "adminArea",
    "region",
];
const POSTAL_PATHS: &[&str] = &["address.postal1", "address.postalCode", "postal1", "postalCode"];

const LAT_PATHS: &[&str] = &["location.latitude", "latitude"];
const LNG_PATHS: &[&str] = &["location.longitude", "longitude"];

const ID_PATHS: &[&str] = &["identifier.Id", "identifier.id", "identifier.attomId", "id", "attomId"];

const PROPERTY_TYPE_PATHS: &[&str] =
    &["summary.proptype", "summary.propertyType", "proptype", "propertyType"];
const BEDS_PATHS: &[&str] = &["building.rooms.beds", "beds"];
const BATHS_PATHS: &[&str] =
    &["building.rooms.bathstotal", "building.rooms.bathsTotal", "bathstotal", "baths"];
const SQFT_PATHS: &[&str] = &[
    "building.size.universalsize",
    "building.size.universalSize",
    "building.size.livingsize",
    "squarefeet",
    "squareFeet",
];

const AVM_PATHS: &[&str] = &["avm.amount.value", "avm.amount", "avm"];
const SALE_PRICE_PATHS: &[&str] =
    &["sale.amount.saleamt", "sale.amount.saleAmt", "sale.saleamt", "lastSalePrice"];
const SALE_DATE_PATHS: &[&str] = &[
    "sale.amount.salerecdate",
    "sale.salesearchdate",
    "sale.saleTransDate",
    "lastSaleDate",
];

/// Aggressive address normalization for fuzzy matching and cache-key
/// derivation — never for display. Lower-cases, strips every character that
/// is neither alphanumeric nor whitespace, collapses runs of whitespace,
/// and trims.
#[must_use]
pub fn normalize_address_text(raw: &str) -> String {
    let stripped: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts the list of per-property objects from a payload, tolerating the
/// upstream's wrapper variants: a `property` or `properties` array, a
/// single wrapped object, or a bare object.
#[must_use]
pub fn property_items(payload: &Value) -> Vec<&Value> {
    for key in ["property", "properties"] {
        match payload.get(key) {
            Some(Value::Array(items)) => return items.iter().collect(),
            Some(item @ Value::Object(_)) => return vec![item],
            _ => {}
        }
    }
    match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![payload],
        _ => Vec::new(),
    }
}

/// The first property object in a payload, if any.
#[must_use]
pub fn first_property(payload: &Value) -> Option<&Value> {
    property_items(payload).into_iter().next()
}

/// Builds a display address from whichever parts are present, joined by
/// `", "`. Falls back to [`ADDRESS_UNKNOWN`] — never an empty string.
fn build_address(item: &Value) -> String {
    let parts: Vec<&str> = [LINE_PATHS, LOCALITY_PATHS, REGION_PATHS, POSTAL_PATHS]
        .into_iter()
        .filter_map(|paths| first_str(item, paths))
        .collect();

    if parts.is_empty() {
        ADDRESS_UNKNOWN.to_string()
    } else {
        parts.join(", ")
    }
}

/// Normalizes one upstream property into a map-pin record.
///
/// Returns `None` when neither `location.latitude/longitude` nor bare
/// `latitude/longitude` resolve — the record is discarded entirely rather
/// than emitted with null coordinates. `index` is the item's position in
/// the upstream list, used for the synthetic `p-{index}` identifier when
/// upstream omits one.
#[must_use]
pub fn normalize_parcel(item: &Value, index: usize) -> Option<ParcelRecord> {
    let latitude = first_f64_lenient(item, LAT_PATHS)?;
    let longitude = first_f64_lenient(item, LNG_PATHS)?;

    let external_id = first_id(item, ID_PATHS).unwrap_or_else(|| format!("p-{index}"));

    Some(ParcelRecord {
        address: build_address(item),
        latitude,
        longitude,
        external_id,
        property_type: first_str(item, PROPERTY_TYPE_PATHS).map(String::from),
        beds: first_f64(item, BEDS_PATHS),
        baths: first_f64(item, BATHS_PATHS),
        square_feet: first_f64(item, SQFT_PATHS),
    })
}

/// Normalizes one upstream property into an address-resolution record,
/// adding valuation and last-sale fields to the map-pin shape.
#[must_use]
pub fn normalize_address_parcel(item: &Value, index: usize) -> Option<AddressParcelRecord> {
    let parcel = normalize_parcel(item, index)?;

    Some(AddressParcelRecord {
        address: parcel.address,
        latitude: parcel.latitude,
        longitude: parcel.longitude,
        external_id: parcel.external_id,
        property_type: parcel.property_type,
        beds: parcel.beds,
        baths: parcel.baths,
        square_feet: parcel.square_feet,
        estimate: first_f64(item, AVM_PATHS),
        last_sale_price: first_f64(item, SALE_PRICE_PATHS),
        last_sale_date: first_str(item, SALE_DATE_PATHS).map(String::from),
    })
}

/// Normalizes a whole payload into map-pin records, dropping properties
/// without coordinates.
#[must_use]
pub fn normalize_parcel_list(payload: &Value) -> Vec<ParcelRecord> {
    property_items(payload)
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| normalize_parcel(item, index))
        .collect()
}

/// Finds the raw property object whose identifier (including the synthetic
/// `p-{index}` fallback) matches `external_id`. Used to store the matched
/// item's full payload after a best-match resolution.
#[must_use]
pub fn property_item_for_id<'a>(payload: &'a Value, external_id: &str) -> Option<&'a Value> {
    property_items(payload)
        .into_iter()
        .enumerate()
        .find(|(index, item)| {
            first_id(item, ID_PATHS).unwrap_or_else(|| format!("p-{index}")) == external_id
        })
        .map(|(_, item)| item)
}

/// Picks the best address match from a payload.
///
/// Every item is mapped to an [`AddressParcelRecord`] (dropping the
/// coordinate-less). With no target, the first mapped record wins. With a
/// target, the first record whose normalized address *contains* the
/// normalized target wins — substring, not equality, because upstream's
/// address formatting rarely matches user-typed input exactly. When nothing
/// contains the target, the first record still wins: the radius query
/// already constrained results to the immediate vicinity, so the first
/// result is usually spatially correct even when textually non-matching.
/// `None` only when no item survived normalization.
#[must_use]
pub fn resolve_best_match(payload: &Value, target: Option<&str>) -> Option<AddressParcelRecord> {
    let candidates: Vec<AddressParcelRecord> = property_items(payload)
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| normalize_address_parcel(item, index))
        .collect();

    let normalized_target = target.map(normalize_address_text).filter(|t| !t.is_empty());

    if let Some(target) = normalized_target {
        if let Some(hit) = candidates
            .iter()
            .find(|c| normalize_address_text(&c.address).contains(&target))
        {
            return Some(hit.clone());
        }
    }

    candidates.into_iter().next()
}
