//! HTTP handler functions for the parcel map API.

use actix_web::{HttpRequest, HttpResponse, web};
use parcel_map_attom_models::Bounds;
use parcel_map_server_models::{
    ApiError, ApiHealth, LookupQueryParams, ParcelQueryParams, ResolveQueryParams,
    SnapshotQueryParams,
};
use parcel_map_service::ServiceError;

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/parcels`
///
/// Parcels for the given viewport. Never fails on upstream trouble; the
/// degraded response is an empty list.
pub async fn parcels(
    state: web::Data<AppState>,
    params: web::Query<ParcelQueryParams>,
    req: HttpRequest,
) -> HttpResponse {
    let caller = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    let bounds = Bounds::new(params.n, params.s, params.e, params.w);

    let result = state
        .service
        .get_map_parcels(bounds, params.zoom, &caller)
        .await;
    HttpResponse::Ok().json(result)
}

/// `GET /api/resolve`
///
/// Resolves a typed address against the current viewport.
pub async fn resolve(
    state: web::Data<AppState>,
    params: web::Query<ResolveQueryParams>,
) -> HttpResponse {
    let bounds = Bounds::new(params.n, params.s, params.e, params.w);

    match state.service.resolve_address(&params.address, bounds).await {
        Ok(resolved) => HttpResponse::Ok().json(resolved),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/lookup`
///
/// Resolves a map click to its parcel.
pub async fn lookup(
    state: web::Data<AppState>,
    params: web::Query<LookupQueryParams>,
) -> HttpResponse {
    match state
        .service
        .lookup_by_location(params.lat, params.lng, params.address.as_deref())
        .await
    {
        Ok(resolved) => HttpResponse::Ok().json(resolved),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/snapshot`
///
/// The seven-section snapshot for one property.
pub async fn snapshot(
    state: web::Data<AppState>,
    params: web::Query<SnapshotQueryParams>,
) -> HttpResponse {
    match state
        .service
        .get_property_snapshot(&params.attom_id, params.lat, params.lng)
        .await
    {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &ServiceError) -> HttpResponse {
    let body = ApiError {
        error: err.to_string(),
    };
    match err {
        ServiceError::MissingLocation => {
            log::debug!("rejecting request: {err}");
            HttpResponse::BadRequest().json(body)
        }
        ServiceError::Configuration => {
            log::error!("request failed: {err}");
            HttpResponse::InternalServerError().json(body)
        }
        ServiceError::Upstream { .. } | ServiceError::Transport(_) => {
            log::error!("request failed: {err}");
            HttpResponse::BadGateway().json(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, test};
    use async_trait::async_trait;
    use chrono::Duration;
    use parcel_map_attom::{AttomError, PropertyApi};
    use parcel_map_cache::CacheStore;
    use parcel_map_service::{ParcelService, ServiceConfig};
    use serde_json::{Value, json};

    use super::*;
    use crate::api_scope;

    struct StubApi {
        payload: Value,
    }

    #[async_trait]
    impl PropertyApi for StubApi {
        async fn fetch_snapshot_for_bounds(
            &self,
            _bounds: &Bounds,
        ) -> Result<Value, AttomError> {
            Ok(self.payload.clone())
        }
    }

    fn test_state(payload: Value) -> web::Data<AppState> {
        let config = ServiceConfig {
            tile_min_interval: Duration::zero(),
            ..ServiceConfig::default()
        };
        let service = ParcelService::new(
            Arc::new(StubApi { payload }),
            CacheStore::new(None),
            config,
        );
        web::Data::new(AppState { service })
    }

    fn property(address: &str, lat: f64, lng: f64, id: u64) -> Value {
        json!({
            "identifier": {"Id": id},
            "address": {"line1": address, "locality": "Springfield"},
            "location": {"latitude": lat, "longitude": lng}
        })
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let app =
            test::init_service(App::new().app_data(test_state(Value::Null)).service(api_scope()))
                .await;
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["healthy"], true);
        assert!(body["version"].is_string());
    }

    #[actix_web::test]
    async fn parcels_returns_pins_with_cache_tag() {
        let payload = json!({"property": [property("1 Main St", 40.71, -74.01, 1)]});
        let app =
            test::init_service(App::new().app_data(test_state(payload)).service(api_scope()))
                .await;

        let req = test::TestRequest::get()
            .uri("/api/parcels?n=40.72&s=40.70&e=-74.00&w=-74.02&zoom=15")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["parcels"].as_array().unwrap().len(), 1);
        assert_eq!(body["cache"], "miss");
    }

    #[actix_web::test]
    async fn parcels_rejects_partial_viewport() {
        let app =
            test::init_service(App::new().app_data(test_state(Value::Null)).service(api_scope()))
                .await;
        let req = test::TestRequest::get()
            .uri("/api/parcels?n=40.72&s=40.70&zoom=15")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn lookup_resolves_a_click() {
        let payload = json!({"property": [property("1 Main St", 40.71, -74.01, 1)]});
        let app =
            test::init_service(App::new().app_data(test_state(payload)).service(api_scope()))
                .await;

        let req = test::TestRequest::get()
            .uri("/api/lookup?lat=40.71&lng=-74.01")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["parcel"]["externalId"], "1");
    }

    #[actix_web::test]
    async fn snapshot_without_location_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(test_state(json!({"property": []})))
                .service(api_scope()),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/api/snapshot?attomId=9")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn snapshot_with_location_returns_sections() {
        let mut item = property("1 Main St", 40.71, -74.01, 7);
        item.as_object_mut().unwrap().insert(
            "assessment".to_string(),
            json!({"tax": {"taxamt": 4100, "taxyear": 2024}}),
        );
        let app = test::init_service(
            App::new()
                .app_data(test_state(json!({"property": [item]})))
                .service(api_scope()),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/snapshot?attomId=7&lat=40.71&lng=-74.01")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["externalId"], "7");
        assert_eq!(body["sections"]["tax"]["taxAmount"], 4100.0);
        assert_eq!(body["sectionExpiry"].as_object().unwrap().len(), 7);
    }
}
