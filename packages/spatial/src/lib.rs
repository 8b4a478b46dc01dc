#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial analysis of crime incidents for safest-path routing.
//!
//! Buckets incidents into a uniform lattice of hotspot cells
//! ([`hotspots`]), turns the dangerous cells into circular exclusion
//! polygons a routing provider can avoid ([`exclusion`]), and scores a
//! candidate route against the incident set using an R-tree for the
//! neighbourhood lookups ([`scoring`]).

pub mod exclusion;
pub mod hotspots;
pub mod scoring;

use geo::{Distance, Haversine};
use saferoute_crime_models::Point;

pub use exclusion::{ExclusionRegion, RegionTuning, build_regions, limit_regions};
pub use hotspots::{CellKey, ClusterTuning, GridCell, cluster, cluster_raw};
pub use scoring::{RouteRisk, RouteScorer, ScoringTuning};

/// Metres per degree of latitude in the small-area approximation.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Great-circle distance between two points in metres.
#[must_use]
pub fn haversine_m(a: Point, b: Point) -> f64 {
    Haversine.distance(to_geo(a), to_geo(b))
}

/// Total great-circle length of a polyline in metres.
#[must_use]
pub fn path_length_m(points: &[Point]) -> f64 {
    points.windows(2).map(|w| haversine_m(w[0], w[1])).sum()
}

/// Converts a [`Point`] to a `geo` point (x = longitude, y = latitude).
#[must_use]
pub fn to_geo(point: Point) -> geo::Point<f64> {
    geo::Point::new(point.longitude, point.latitude)
}

/// Converts a linear offset in metres into `(Δlat, Δlng)` degrees at the
/// given latitude.
#[must_use]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> (f64, f64) {
    let lat_deg = meters / METERS_PER_DEGREE;
    let cos_lat = latitude.to_radians().cos().abs().max(1e-6);
    (lat_deg, meters / (METERS_PER_DEGREE * cos_lat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_one_degree_latitude() {
        let d = haversine_m(Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn haversine_is_zero_for_same_point() {
        let p = Point::new(33.6, 73.0);
        assert!(haversine_m(p, p).abs() < 1e-9);
    }

    #[test]
    fn path_length_sums_segments() {
        let a = Point::new(33.6, 73.0);
        let b = Point::new(33.61, 73.0);
        let c = Point::new(33.62, 73.0);
        let total = path_length_m(&[a, b, c]);
        assert!((total - haversine_m(a, c)).abs() < 1.0);
        assert!(path_length_m(&[a]).abs() < f64::EPSILON);
    }

    #[test]
    fn longitude_degrees_widen_away_from_equator() {
        let (lat_eq, lng_eq) = meters_to_degrees(1000.0, 0.0);
        let (lat_hi, lng_hi) = meters_to_degrees(1000.0, 60.0);
        assert!((lat_eq - lat_hi).abs() < 1e-12);
        assert!((lng_hi - 2.0 * lng_eq).abs() < 1e-6);
    }
}
