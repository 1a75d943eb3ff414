#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the parcel map application.
//!
//! Serves the REST API the map frontend talks to: parcels per viewport,
//! address and map-click resolution, and per-property snapshots. All
//! property data flows through the caching orchestration layer in
//! `parcel_map_service`; this crate is routing, parameter parsing, and
//! error-to-status mapping only.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, Scope, middleware, web};
use parcel_map_attom::client::AttomClient;
use parcel_map_cache::{CacheBackend, CacheStore, RedisBackend};
use parcel_map_service::{ParcelService, ServiceConfig};

/// Shared application state.
pub struct AppState {
    /// The caching orchestration layer.
    pub service: Arc<ParcelService>,
}

/// The `/api` route table.
#[must_use]
pub fn api_scope() -> Scope {
    web::scope("/api")
        .route("/health", web::get().to(handlers::health))
        .route("/parcels", web::get().to(handlers::parcels))
        .route("/resolve", web::get().to(handlers::resolve))
        .route("/lookup", web::get().to(handlers::lookup))
        .route("/snapshot", web::get().to(handlers::snapshot))
}

/// Starts the parcel map API server.
///
/// Builds the upstream client from `ATTOM_API_KEY`/`ATTOM_BASE_URL`,
/// connects the remote cache tier when `REDIS_URL` is set (memory-only
/// otherwise), and binds per `BIND_ADDR`/`PORT`. This is a regular async
/// function — the caller provides the runtime.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the upstream HTTP client cannot be constructed or the
/// configured Redis instance cannot be reached.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let api = AttomClient::from_env().expect("Failed to build upstream ATTOM client");

    let remote: Option<Arc<dyn CacheBackend>> = match std::env::var("REDIS_URL") {
        Ok(url) => {
            log::info!("Connecting to Redis cache tier...");
            let backend = RedisBackend::connect(&url)
                .await
                .expect("Failed to connect to Redis");
            Some(Arc::new(backend))
        }
        Err(_) => {
            log::info!("REDIS_URL not set, running with in-memory cache only");
            None
        }
    };

    let service = ParcelService::new(
        Arc::new(api),
        CacheStore::new(remote),
        ServiceConfig::from_env(),
    );
    let state = web::Data::new(AppState { service });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(api_scope())
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
