//! Continuous risk scoring of a route against an incident set.
//!
//! Every route point collects `weight · exp(-d / decay)` from each incident
//! within the cutoff distance. The route score is the mean per-point
//! contribution, amplified by the share of points that are individually
//! high-risk: a route threading several dangerous stretches scores worse
//! than one with a single bad segment even when their means are close.

use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use saferoute_crime_models::{Incident, Point, SeverityWeights};
use serde::{Deserialize, Serialize};

use crate::{haversine_m, meters_to_degrees};

/// Envelope padding so the degree-box query never clips incidents the
/// haversine check would accept.
const ENVELOPE_PADDING: f64 = 1.05;

/// Scoring constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringTuning {
    /// Incidents farther than this (metres) contribute nothing.
    pub cutoff_m: f64,
    /// Exponential decay length in metres.
    pub decay_m: f64,
    /// A point whose contribution exceeds this is high-risk.
    pub high_risk_point_threshold: f64,
    /// Multiplier applied to the high-risk point ratio.
    pub amplification: f64,
}

impl Default for ScoringTuning {
    fn default() -> Self {
        Self {
            cutoff_m: 1200.0,
            decay_m: 400.0,
            high_risk_point_threshold: 2.0,
            amplification: 1.5,
        }
    }
}

/// Breakdown of a route score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRisk {
    /// Final amplified score.
    pub score: f64,
    /// Sum of every point's contribution.
    pub total: f64,
    /// Points whose own contribution exceeded the high-risk threshold.
    pub high_risk_points: usize,
    /// Per-point contributions, in route order.
    pub contributions: Vec<f64>,
}

type IndexedIncident = GeomWithData<[f64; 2], f64>;

/// Scores routes against a fixed incident set.
///
/// Built once per request; the R-tree keeps each point's neighbourhood
/// lookup logarithmic instead of scanning every incident.
pub struct RouteScorer {
    index: RTree<IndexedIncident>,
    tuning: ScoringTuning,
}

impl RouteScorer {
    /// Indexes `incidents` with their severity weights.
    #[must_use]
    pub fn new(incidents: &[Incident], weights: &SeverityWeights, tuning: ScoringTuning) -> Self {
        let entries: Vec<IndexedIncident> = incidents
            .iter()
            .map(|i| GeomWithData::new(i.position.lng_lat(), weights.weight(&i.category)))
            .collect();

        Self {
            index: RTree::bulk_load(entries),
            tuning,
        }
    }

    /// Number of indexed incidents.
    #[must_use]
    pub fn incident_count(&self) -> usize {
        self.index.size()
    }

    /// Sum of decayed severity contributions at a single point.
    #[must_use]
    pub fn point_contribution(&self, point: Point) -> f64 {
        if self.index.size() == 0 {
            return 0.0;
        }

        query_envelopes(point, self.tuning.cutoff_m * ENVELOPE_PADDING)
            .iter()
            .flat_map(|envelope| self.index.locate_in_envelope(envelope))
            .filter_map(|entry| {
                let [lng, lat] = *entry.geom();
                let distance = haversine_m(point, Point::new(lat, lng));
                (distance <= self.tuning.cutoff_m)
                    .then(|| entry.data * (-distance / self.tuning.decay_m).exp())
            })
            .sum()
    }

    /// Scores a route and returns the full breakdown.
    #[must_use]
    pub fn score_detailed(&self, points: &[Point]) -> RouteRisk {
        if points.is_empty() || self.index.size() == 0 {
            return RouteRisk {
                score: 0.0,
                total: 0.0,
                high_risk_points: 0,
                contributions: vec![0.0; points.len()],
            };
        }

        let contributions: Vec<f64> = points
            .iter()
            .map(|p| self.point_contribution(*p))
            .collect();
        let total: f64 = contributions.iter().sum();
        let high_risk_points = contributions
            .iter()
            .filter(|c| **c > self.tuning.high_risk_point_threshold)
            .count();

        #[allow(clippy::cast_precision_loss)]
        let point_count = points.len() as f64;
        #[allow(clippy::cast_precision_loss)]
        let high_risk_ratio = high_risk_points as f64 / point_count;
        let score = (total / point_count) * high_risk_ratio.mul_add(self.tuning.amplification, 1.0);

        RouteRisk {
            score,
            total,
            high_risk_points,
            contributions,
        }
    }

    /// Scores a route. Non-negative; exactly zero with no incidents.
    #[must_use]
    pub fn score(&self, points: &[Point]) -> f64 {
        self.score_detailed(points).score
    }
}

/// Degree boxes covering every point within `radius_m` of `point`.
///
/// A box that crosses the antimeridian is split in two; one that reaches a
/// pole spans every longitude.
fn query_envelopes(point: Point, radius_m: f64) -> Vec<AABB<[f64; 2]>> {
    let (lat_deg, lng_deg) = meters_to_degrees(radius_m, point.latitude);
    let south = point.latitude - lat_deg;
    let north = point.latitude + lat_deg;
    let west = point.longitude - lng_deg;
    let east = point.longitude + lng_deg;
    let band = |west: f64, east: f64| AABB::from_corners([west, south], [east, north]);

    if lng_deg >= 180.0 || north >= 90.0 || south <= -90.0 {
        vec![band(-180.0, 180.0)]
    } else if west < -180.0 {
        vec![band(-180.0, east), band(west + 360.0, 180.0)]
    } else if east > 180.0 {
        vec![band(west, 180.0), band(-180.0, east - 360.0)]
    } else {
        vec![band(west, east)]
    }
}
