//! Uniform-lattice hotspot clustering.
//!
//! Every incident is dropped into the lattice cell containing it and the
//! cell accumulates a count, a severity sum, and severity-weighted
//! coordinate sums. The centroid is derived from the sums with a single
//! division, so the result does not depend on the order incidents arrive
//! in.

use std::collections::BTreeMap;

use saferoute_crime_models::{Incident, Point, SeverityWeights, normalize_incidents};
use serde::{Deserialize, Serialize};

/// Integer lattice coordinates of a cell: `(floor(lng/edge), floor(lat/edge))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    /// Column index, from longitude.
    pub x: i64,
    /// Row index, from latitude.
    pub y: i64,
}

impl CellKey {
    /// Returns the cell containing `point` for the given edge length.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn for_point(point: Point, edge_deg: f64) -> Self {
        Self {
            x: (point.longitude / edge_deg).floor() as i64,
            y: (point.latitude / edge_deg).floor() as i64,
        }
    }
}

/// Lattice configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterTuning {
    /// Cell edge length in degrees. The default (0.0015°) is roughly
    /// 167 m of latitude.
    pub cell_edge_deg: f64,
}

impl Default for ClusterTuning {
    fn default() -> Self {
        Self {
            cell_edge_deg: 0.0015,
        }
    }
}

/// Aggregated incidents falling in one lattice cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// Lattice position.
    pub key: CellKey,
    /// Number of incidents folded in.
    pub count: u32,
    /// Sum of incident severity weights.
    pub severity_sum: f64,
    weighted_lat: f64,
    weighted_lng: f64,
}

impl GridCell {
    fn new(key: CellKey) -> Self {
        Self {
            key,
            count: 0,
            severity_sum: 0.0,
            weighted_lat: 0.0,
            weighted_lng: 0.0,
        }
    }

    fn fold(&mut self, position: Point, weight: f64) {
        self.count += 1;
        self.severity_sum += weight;
        self.weighted_lat += position.latitude * weight;
        self.weighted_lng += position.longitude * weight;
    }

    /// Severity-weighted centroid of the cell's incidents.
    #[must_use]
    pub fn centroid(&self) -> Point {
        if self.severity_sum <= 0.0 {
            return Point::new(0.0, 0.0);
        }
        Point::new(
            self.weighted_lat / self.severity_sum,
            self.weighted_lng / self.severity_sum,
        )
    }

    /// Ranking score used to order exclusion regions: `severity + 2 × count`.
    #[must_use]
    pub fn priority(&self) -> f64 {
        self.severity_sum + 2.0 * f64::from(self.count)
    }
}

/// Buckets incidents into lattice cells.
#[must_use]
pub fn cluster(
    incidents: &[Incident],
    weights: &SeverityWeights,
    tuning: &ClusterTuning,
) -> BTreeMap<CellKey, GridCell> {
    let mut cells: BTreeMap<CellKey, GridCell> = BTreeMap::new();

    for incident in incidents {
        let key = CellKey::for_point(incident.position, tuning.cell_edge_deg);
        cells
            .entry(key)
            .or_insert_with(|| GridCell::new(key))
            .fold(incident.position, weights.weight(&incident.category));
    }

    log::debug!(
        "Clustered {} incident(s) into {} cell(s)",
        incidents.len(),
        cells.len()
    );

    cells
}

/// Normalizes raw JSON incident records and clusters the parseable ones.
/// Records without usable coordinates are skipped.
#[must_use]
pub fn cluster_raw(
    records: &[serde_json::Value],
    weights: &SeverityWeights,
    tuning: &ClusterTuning,
) -> BTreeMap<CellKey, GridCell> {
    cluster(&normalize_incidents(records), weights, tuning)
}
