//! Candidate-path field extraction over upstream JSON.
//!
//! The upstream API spells the same logical field several ways depending on
//! endpoint lineage (`saleamt` vs `saleAmt`, nested vs flat). Each logical
//! field is therefore read through an ordered list of dot-separated
//! candidate paths, evaluated until one yields a usable value. Numbers are
//! accepted only when finite; everything else degrades to `None`.

use serde_json::Value;

/// Walks a dot-separated path (`"building.rooms.beds"`) into a JSON object.
#[must_use]
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, key| v.get(key))
}

/// First candidate path that resolves to a non-null value.
#[must_use]
pub fn first_value<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .find(|v| !v.is_null())
}

/// First candidate path holding a finite number.
///
/// Strings and non-finite numbers are rejected — a field that is sometimes
/// `"N/A"` must become `None`, not `0`.
#[must_use]
pub fn first_f64(value: &Value, paths: &[&str]) -> Option<f64> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(|v| v.as_f64().filter(|n| n.is_finite()))
}

/// First candidate path holding a finite number, tolerating numbers encoded
/// as strings.
///
/// Coordinates in particular arrive both ways upstream.
#[must_use]
pub fn first_f64_lenient(value: &Value, paths: &[&str]) -> Option<f64> {
    paths.iter().filter_map(|path| lookup(value, path)).find_map(|v| match v {
        Value::Number(n) => n.as_f64().filter(|x| x.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
        _ => None,
    })
}

/// First candidate path holding a non-empty string. The result is trimmed.
#[must_use]
pub fn first_str<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a str> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// First candidate path holding a boolean.
#[must_use]
pub fn first_bool(value: &Value, paths: &[&str]) -> Option<bool> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(Value::as_bool)
}

/// First candidate path usable as an identifier: a non-empty string or any
/// number, rendered as a string.
#[must_use]
pub fn first_id(value: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().filter_map(|path| lookup(value, path)).find_map(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First candidate path holding a non-empty array.
#[must_use]
pub fn first_array<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a Vec<Value>> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .filter_map(Value::as_array)
        .find(|items| !items.is_empty())
}
