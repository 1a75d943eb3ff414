#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the parcel map server.
//!
//! Query parameter structs are deserialized by actix from the URL; a
//! missing or malformed required parameter rejects the request before the
//! handler runs. Response bodies for the data endpoints are the service
//! layer's own serializable types.

use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Always `true` when the server can answer at all.
    pub healthy: bool,
    /// Crate version of the running server.
    pub version: String,
}

/// Uniform error body for failed requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Human-readable description of the failure.
    pub error: String,
}

/// Query parameters for the map parcels endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelQueryParams {
    /// Northern latitude edge of the viewport.
    pub n: f64,
    /// Southern latitude edge of the viewport.
    pub s: f64,
    /// Eastern longitude edge of the viewport.
    pub e: f64,
    /// Western longitude edge of the viewport.
    pub w: f64,
    /// Map zoom level.
    pub zoom: u8,
}

/// Query parameters for the address resolution endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveQueryParams {
    /// The address as typed by the user.
    pub address: String,
    /// Northern latitude edge of the current viewport.
    pub n: f64,
    /// Southern latitude edge of the current viewport.
    pub s: f64,
    /// Eastern longitude edge of the current viewport.
    pub e: f64,
    /// Western longitude edge of the current viewport.
    pub w: f64,
}

/// Query parameters for the map-click lookup endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupQueryParams {
    /// Clicked latitude.
    pub lat: f64,
    /// Clicked longitude.
    pub lng: f64,
    /// Address associated with the click, when the frontend has one.
    pub address: Option<String>,
}

/// Query parameters for the property snapshot endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotQueryParams {
    /// Upstream property identifier.
    pub attom_id: String,
    /// Latitude for a cold fetch, when the frontend has it.
    pub lat: Option<f64>,
    /// Longitude for a cold fetch, when the frontend has it.
    pub lng: Option<f64>,
}
