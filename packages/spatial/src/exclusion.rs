//! Exclusion polygons around high-risk hotspot cells.
//!
//! A cell qualifies when it has enough incidents *or* enough accumulated
//! severity, so a sparse cluster of severe crimes still gets a region.
//! Each region is a regular polygon approximating a circle whose radius
//! grows with the cell's density and severity.

use std::collections::BTreeMap;

use geo::{LineString, MultiPolygon, Polygon};
use saferoute_crime_models::Point;
use serde::{Deserialize, Serialize};

use crate::hotspots::{CellKey, GridCell};
use crate::meters_to_degrees;

/// Thresholds and radius terms for region generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionTuning {
    /// A cell with at least this many incidents qualifies.
    pub min_count: u32,
    /// A cell with at least this much severity qualifies.
    pub min_severity: f64,
    /// Radius every region starts with, in metres.
    pub base_radius_m: f64,
    /// Metres added per incident in the cell.
    pub density_step_m: f64,
    /// Upper bound of the density term.
    pub density_cap_m: f64,
    /// Metres added per unit of severity in the cell.
    pub severity_step_m: f64,
    /// Upper bound of the severity term.
    pub severity_cap_m: f64,
    /// Upper bound of the final radius.
    pub max_radius_m: f64,
    /// Number of distinct polygon vertices.
    pub vertices: usize,
}

impl Default for RegionTuning {
    fn default() -> Self {
        Self {
            min_count: 3,
            min_severity: 6.0,
            base_radius_m: 150.0,
            density_step_m: 20.0,
            density_cap_m: 200.0,
            severity_step_m: 10.0,
            severity_cap_m: 250.0,
            max_radius_m: 500.0,
            vertices: 16,
        }
    }
}

impl RegionTuning {
    /// Whether a cell is dangerous enough to become a region.
    #[must_use]
    pub fn qualifies(&self, cell: &GridCell) -> bool {
        cell.count >= self.min_count || cell.severity_sum >= self.min_severity
    }

    /// Radius in metres for a qualifying cell.
    #[must_use]
    pub fn radius_m(&self, cell: &GridCell) -> f64 {
        let density = (f64::from(cell.count) * self.density_step_m).min(self.density_cap_m);
        let severity = (cell.severity_sum * self.severity_step_m).min(self.severity_cap_m);
        (self.base_radius_m + density + severity).min(self.max_radius_m)
    }
}

/// A polygon the routing provider is asked to avoid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionRegion {
    /// Source cell.
    pub key: CellKey,
    /// Severity-weighted centroid of the source cell.
    pub centroid: Point,
    /// Approximate circle radius in metres.
    pub radius_m: f64,
    /// `severity + 2 × count`; higher sorts first.
    pub priority: f64,
    /// Incidents in the source cell.
    pub count: u32,
    /// Severity sum of the source cell.
    pub severity: f64,
    /// Closed ring (first point repeated at the end).
    pub ring: Vec<Point>,
}

impl ExclusionRegion {
    /// Builds the region for one cell.
    #[must_use]
    pub fn from_cell(cell: &GridCell, tuning: &RegionTuning) -> Self {
        let centroid = cell.centroid();
        let radius_m = tuning.radius_m(cell);
        Self {
            key: cell.key,
            centroid,
            radius_m,
            priority: cell.priority(),
            count: cell.count,
            severity: cell.severity_sum,
            ring: circle_ring(centroid, radius_m, tuning.vertices),
        }
    }

    /// The ring as a `geo` polygon (x = longitude, y = latitude).
    #[must_use]
    pub fn to_polygon(&self) -> Polygon<f64> {
        let exterior: LineString<f64> = self
            .ring
            .iter()
            .map(|p| (p.longitude, p.latitude))
            .collect::<Vec<_>>()
            .into();
        Polygon::new(exterior, vec![])
    }

    /// The region as a `GeoJSON` feature with its ranking metadata.
    #[must_use]
    pub fn to_feature(&self) -> geojson::Feature {
        let mut properties = serde_json::Map::new();
        properties.insert("priority".to_string(), self.priority.into());
        properties.insert("radiusM".to_string(), self.radius_m.into());
        properties.insert("count".to_string(), self.count.into());
        properties.insert("severity".to_string(), self.severity.into());

        geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(
                &self.to_polygon(),
            ))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Builds a closed regular polygon of `vertices` points around `center`.
///
/// Uses the small-area approximation: 1° of latitude is 111.32 km and
/// longitude degrees are scaled by `cos(latitude)`.
#[must_use]
pub fn circle_ring(center: Point, radius_m: f64, vertices: usize) -> Vec<Point> {
    let vertices = vertices.max(3);
    let (lat_deg, lng_deg) = meters_to_degrees(radius_m, center.latitude);

    let mut ring: Vec<Point> = (0..vertices)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let theta = std::f64::consts::TAU * (i as f64) / (vertices as f64);
            Point::new(
                center.latitude + lat_deg * theta.sin(),
                center.longitude + lng_deg * theta.cos(),
            )
        })
        .collect();

    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
    ring
}

/// Converts every qualifying cell into a region, highest priority first.
#[must_use]
pub fn build_regions(
    cells: &BTreeMap<CellKey, GridCell>,
    tuning: &RegionTuning,
) -> Vec<ExclusionRegion> {
    let mut regions: Vec<ExclusionRegion> = cells
        .values()
        .filter(|cell| tuning.qualifies(cell))
        .map(|cell| ExclusionRegion::from_cell(cell, tuning))
        .collect();

    regions.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then_with(|| a.key.cmp(&b.key))
    });

    log::debug!(
        "{} of {} cell(s) qualify as exclusion regions",
        regions.len(),
        cells.len()
    );

    regions
}

/// Keeps the `max` highest-priority regions. Expects input already sorted
/// by [`build_regions`].
#[must_use]
pub fn limit_regions(regions: &[ExclusionRegion], max: usize) -> &[ExclusionRegion] {
    &regions[..regions.len().min(max)]
}

/// All regions as one `MultiPolygon`, the shape routing providers accept
/// for avoid areas.
#[must_use]
pub fn to_multi_polygon(regions: &[ExclusionRegion]) -> MultiPolygon<f64> {
    MultiPolygon(regions.iter().map(ExclusionRegion::to_polygon).collect())
}

/// Renders regions as a `GeoJSON` feature collection for map display.
#[must_use]
pub fn regions_to_feature_collection(regions: &[ExclusionRegion]) -> geojson::FeatureCollection {
    geojson::FeatureCollection {
        bbox: None,
        features: regions.iter().map(ExclusionRegion::to_feature).collect(),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use saferoute_crime_models::{Incident, SeverityWeights};

    use super::*;
    use crate::haversine_m;
    use crate::hotspots::{ClusterTuning, cluster};

    fn cells_for(incidents: &[Incident]) -> BTreeMap<CellKey, GridCell> {
        cluster(incidents, &SeverityWeights::default(), &ClusterTuning::default())
    }

    #[test]
    fn sparse_but_severe_cell_qualifies() {
        let cells = cells_for(&[
            Incident::new(33.6005, 73.0005, "murder"),
            Incident::new(33.6005, 73.0005, "rape"),
        ]);
        let regions = build_regions(&cells, &RegionTuning::default());
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn lone_minor_incident_does_not_qualify() {
        let cells = cells_for(&[Incident::new(33.6005, 73.0005, "graffiti")]);
        assert!(build_regions(&cells, &RegionTuning::default()).is_empty());
    }

    #[test]
    fn dense_cell_qualifies_on_count() {
        let cells = cells_for(&[
            Incident::new(33.6005, 73.0005, "loitering"),
            Incident::new(33.6005, 73.0005, "loitering"),
            Incident::new(33.6005, 73.0005, "loitering"),
        ]);
        assert_eq!(build_regions(&cells, &RegionTuning::default()).len(), 1);
    }

    #[test]
    fn ring_is_closed_with_expected_vertex_count() {
        let ring = circle_ring(Point::new(33.6, 73.0), 300.0, 16);
        assert_eq!(ring.len(), 17);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn ring_vertices_sit_at_the_radius() {
        let center = Point::new(33.6, 73.0);
        for vertex in circle_ring(center, 300.0, 16) {
            let d = haversine_m(center, vertex);
            assert!((d - 300.0).abs() < 5.0, "vertex at {d} m");
        }
    }

    #[test]
    fn radius_is_capped() {
        let incidents: Vec<Incident> = (0..50)
            .map(|_| Incident::new(33.6005, 73.0005, "homicide"))
            .collect();
        let regions = build_regions(&cells_for(&incidents), &RegionTuning::default());
        assert!((regions[0].radius_m - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn radius_grows_with_density_and_severity() {
        let tuning = RegionTuning::default();
        let small = cells_for(&[
            Incident::new(33.6005, 73.0005, "robbery"),
            Incident::new(33.6005, 73.0005, "robbery"),
        ]);
        let large = cells_for(&[
            Incident::new(33.6005, 73.0005, "robbery"),
            Incident::new(33.6005, 73.0005, "robbery"),
            Incident::new(33.6005, 73.0005, "robbery"),
            Incident::new(33.6005, 73.0005, "robbery"),
        ]);
        let small_r = build_regions(&small, &tuning)[0].radius_m;
        let large_r = build_regions(&large, &tuning)[0].radius_m;
        // 150 + 40 + 60 and 150 + 80 + 120
        assert!((small_r - 250.0).abs() < 1e-9);
        assert!((large_r - 350.0).abs() < 1e-9);
    }

    #[test]
    fn regions_are_sorted_by_priority_descending() {
        let mut incidents = vec![
            Incident::new(33.6005, 73.0005, "theft"),
            Incident::new(33.6005, 73.0005, "theft"),
            Incident::new(33.6005, 73.0005, "theft"),
        ];
        incidents.extend((0..6).map(|_| Incident::new(33.7005, 73.1005, "robbery")));
        incidents.extend((0..4).map(|_| Incident::new(33.6505, 73.0505, "assault")));

        let regions = build_regions(&cells_for(&incidents), &RegionTuning::default());
        assert_eq!(regions.len(), 3);
        for pair in regions.windows(2) {
            assert!(pair[0].priority >= pair[1].priority);
        }
        assert_eq!(regions[0].count, 6);
        assert_eq!(limit_regions(&regions, 2).len(), 2);
        assert_eq!(limit_regions(&regions, 10).len(), 3);
    }

    #[test]
    fn feature_collection_has_one_feature_per_region() {
        let cells = cells_for(&[
            Incident::new(33.6005, 73.0005, "robbery"),
            Incident::new(33.6005, 73.0005, "robbery"),
        ]);
        let regions = build_regions(&cells, &RegionTuning::default());
        let fc = regions_to_feature_collection(&regions);
        assert_eq!(fc.features.len(), 1);
        let props = fc.features[0].properties.as_ref().unwrap();
        assert!(props.contains_key("priority"));
        assert_eq!(to_multi_polygon(&regions).0.len(), 1);
    }
}
