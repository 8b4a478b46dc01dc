//! Parsing of the two routing response shapes.
//!
//! * **Feature collection** (`/geojson` endpoint and query-string GET):
//!   `features[0].geometry.coordinates` is a `[lng, lat]` list and
//!   `features[0].properties.summary` holds distance and duration.
//! * **Flat routes** (JSON endpoint): `routes[0].geometry` is an encoded
//!   polyline, a coordinate list, or a `GeoJSON` line string, and
//!   `routes[0].summary` holds distance and duration.

use saferoute_crime_models::Point;
use saferoute_spatial::path_length_m;

use crate::RoutingError;

/// Geometry and metadata extracted from a provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRoute {
    /// Vertices in travel order.
    pub points: Vec<Point>,
    /// Length in metres.
    pub distance_m: f64,
    /// Travel time in seconds.
    pub duration_s: f64,
}

/// Parses a feature-collection response.
///
/// # Errors
///
/// Returns [`RoutingError::Provider`] if the body reports an error, holds no
/// feature, or the geometry is missing or empty.
pub fn parse_feature_collection(body: &serde_json::Value) -> Result<ParsedRoute, RoutingError> {
    check_error_body(body)?;

    let feature = body["features"]
        .as_array()
        .and_then(|features| features.first())
        .ok_or_else(|| provider_error("response has no route features"))?;

    let points = coordinate_list(&feature["geometry"]["coordinates"])
        .ok_or_else(|| provider_error("feature geometry is missing or malformed"))?;

    finish(points, &feature["properties"]["summary"])
}

/// Parses a flat-routes response.
///
/// # Errors
///
/// Returns [`RoutingError::Provider`] if the body reports an error, holds no
/// route, or the geometry cannot be decoded.
pub fn parse_flat_routes(body: &serde_json::Value) -> Result<ParsedRoute, RoutingError> {
    check_error_body(body)?;

    let route = body["routes"]
        .as_array()
        .and_then(|routes| routes.first())
        .ok_or_else(|| provider_error("response has no routes"))?;

    let geometry = &route["geometry"];
    let points = match geometry {
        serde_json::Value::String(encoded) => decode_polyline(encoded, 5),
        serde_json::Value::Array(_) => coordinate_list(geometry),
        serde_json::Value::Object(_) => coordinate_list(&geometry["coordinates"]),
        _ => None,
    }
    .ok_or_else(|| provider_error("route geometry is missing or malformed"))?;

    finish(points, &route["summary"])
}

fn finish(points: Vec<Point>, summary: &serde_json::Value) -> Result<ParsedRoute, RoutingError> {
    if points.is_empty() {
        return Err(provider_error("route geometry is empty"));
    }

    let distance_m = summary["distance"]
        .as_f64()
        .unwrap_or_else(|| path_length_m(&points));
    let duration_s = summary["duration"].as_f64().unwrap_or(0.0);

    Ok(ParsedRoute {
        points,
        distance_m,
        duration_s,
    })
}

fn check_error_body(body: &serde_json::Value) -> Result<(), RoutingError> {
    let error = &body["error"];
    if error.is_null() {
        return Ok(());
    }
    let message = error["message"]
        .as_str()
        .or_else(|| error.as_str())
        .map_or_else(|| error.to_string(), String::from);
    Err(provider_error(&format!("provider error: {message}")))
}

fn provider_error(message: &str) -> RoutingError {
    RoutingError::Provider {
        message: message.to_string(),
    }
}

/// Reads a `[[lng, lat, (elevation)], ...]` list. Any malformed or
/// out-of-range vertex rejects the whole geometry.
fn coordinate_list(value: &serde_json::Value) -> Option<Vec<Point>> {
    value
        .as_array()?
        .iter()
        .map(|pair| {
            let lng = pair.get(0)?.as_f64()?;
            let lat = pair.get(1)?.as_f64()?;
            let point = Point::new(lat, lng);
            point.validate().ok()?;
            Some(point)
        })
        .collect()
}

/// Decodes a Google encoded polyline with `precision` decimal digits.
///
/// Returns `None` for truncated or invalid input.
#[must_use]
pub fn decode_polyline(encoded: &str, precision: u32) -> Option<Vec<Point>> {
    let factor = 10f64.powi(i32::try_from(precision).ok()?);
    let bytes = encoded.as_bytes();
    let mut index = 0usize;
    let mut lat = 0i64;
    let mut lng = 0i64;
    let mut points = Vec::new();

    while index < bytes.len() {
        lat += next_delta(bytes, &mut index)?;
        lng += next_delta(bytes, &mut index)?;

        #[allow(clippy::cast_precision_loss)]
        let point = Point::new(lat as f64 / factor, lng as f64 / factor);
        point.validate().ok()?;
        points.push(point);
    }

    Some(points)
}

fn next_delta(bytes: &[u8], index: &mut usize) -> Option<i64> {
    let mut result = 0i64;
    let mut shift = 0u32;

    loop {
        let byte = i64::from(*bytes.get(*index)?) - 63;
        *index += 1;
        if !(0..64).contains(&byte) || shift > 60 {
            return None;
        }
        result |= (byte & 0x1f) << shift;
        shift += 5;
        if byte < 0x20 {
            break;
        }
    }

    Some(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}
