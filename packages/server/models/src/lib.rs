#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the safest-path server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the planner types to allow independent evolution of the API
//! contract.

use saferoute_crime_models::Point;
use saferoute_planner::{PlanningStrategy, SafestPath, SafestPathMeta};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable description.
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Query parameters for the safest-path endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafestPathParams {
    /// Origin latitude.
    pub start_lat: f64,
    /// Origin longitude.
    pub start_lng: f64,
    /// Destination latitude.
    pub end_lat: f64,
    /// Destination longitude.
    pub end_lng: f64,
    /// Incident lookback window in days (default 30).
    pub lookback_days: Option<u32>,
    /// `provider` (default) or `grid`.
    pub strategy: Option<PlanningStrategy>,
}

impl SafestPathParams {
    #[must_use]
    pub const fn start(&self) -> Point {
        Point::new(self.start_lat, self.start_lng)
    }

    #[must_use]
    pub const fn end(&self) -> Point {
        Point::new(self.end_lat, self.end_lng)
    }
}

/// Query parameters for the hotspots endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotParams {
    /// Incident lookback window in days (default 30).
    pub lookback_days: Option<u32>,
}

/// A safest path as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSafestPath {
    /// Vertices from start to end.
    pub route: Vec<Point>,
    /// The route as a `GeoJSON` `LineString` for map display.
    pub geometry: geojson::Geometry,
    /// Planning metadata.
    pub meta: SafestPathMeta,
}

impl From<SafestPath> for ApiSafestPath {
    fn from(path: SafestPath) -> Self {
        let line = path.route.iter().map(|p| vec![p.longitude, p.latitude]).collect();
        Self {
            geometry: geojson::Geometry::new(geojson::Value::LineString(line)),
            route: path.route,
            meta: path.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_use_camel_case() {
        let params: SafestPathParams = serde_json::from_value(serde_json::json!({
            "startLat": 33.6,
            "startLng": 73.0,
            "endLat": 33.62,
            "endLng": 73.02,
            "strategy": "grid",
        }))
        .unwrap();

        assert_eq!(params.start(), Point::new(33.6, 73.0));
        assert_eq!(params.end(), Point::new(33.62, 73.02));
        assert_eq!(params.strategy, Some(PlanningStrategy::Grid));
        assert!(params.lookback_days.is_none());
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let result: Result<SafestPathParams, _> = serde_json::from_value(serde_json::json!({
            "startLat": 33.6,
            "startLng": 73.0,
            "endLat": 33.62,
            "endLng": 73.02,
            "strategy": "teleport",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn error_body_shape() {
        let body = serde_json::to_value(ApiError::new("No route found")).unwrap();
        assert_eq!(body, serde_json::json!({"error": "No route found"}));
    }
}
