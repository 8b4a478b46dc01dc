//! HTTP handler functions for the safest-path API.

use actix_web::{HttpResponse, web};
use saferoute_planner::{DEFAULT_LOOKBACK_DAYS, SafestPathError};
use saferoute_server_models::{ApiError, ApiHealth, ApiSafestPath, HotspotParams, SafestPathParams};
use saferoute_spatial::exclusion::regions_to_feature_collection;

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/safest-path`
///
/// Computes the safest route between two coordinates.
pub async fn safest_path(
    state: web::Data<AppState>,
    params: web::Query<SafestPathParams>,
) -> HttpResponse {
    let lookback_days = params.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);
    let strategy = params.strategy.unwrap_or_default();

    match state
        .planner
        .compute_with_strategy(params.start(), params.end(), lookback_days, strategy)
        .await
    {
        Ok(path) => HttpResponse::Ok().json(ApiSafestPath::from(path)),
        Err(e) => error_response(&e),
    }
}

/// `GET /api/hotspots`
///
/// Returns the current exclusion regions as a `GeoJSON` feature collection.
pub async fn hotspots(
    state: web::Data<AppState>,
    params: web::Query<HotspotParams>,
) -> HttpResponse {
    let lookback_days = params.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);

    match state.planner.hotspots(lookback_days).await {
        Ok(regions) => HttpResponse::Ok().json(regions_to_feature_collection(&regions)),
        Err(e) => error_response(&e),
    }
}

/// Maps a planner error to its HTTP status.
fn error_response(err: &SafestPathError) -> HttpResponse {
    let body = ApiError::new(err.to_string());
    match err {
        SafestPathError::InvalidInput { .. } => HttpResponse::BadRequest().json(body),
        SafestPathError::NoRouteFound => HttpResponse::NotFound().json(body),
        SafestPathError::Timeout(_) => {
            log::error!("Request timed out: {err}");
            HttpResponse::GatewayTimeout().json(body)
        }
    }
}
