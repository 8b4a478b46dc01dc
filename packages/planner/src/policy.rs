//! Chooses between the direct route and a hotspot-avoiding alternative.
//!
//! The direct route is always fetched first. If it is already low risk it
//! is returned without further provider calls. Otherwise incidents are
//! clustered into exclusion regions, one avoidance route is requested, and
//! the lower-scoring of the two wins. At most two provider calls are made
//! per request, and the result is never worse than the direct route.

use std::sync::Arc;
use std::time::Instant;

use saferoute_crime_models::{Incident, Point};
use saferoute_grid::{CostGrid, find_path};
use saferoute_routing::RouteProvider;
use saferoute_routing_models::{Route, RouteRequest};
use saferoute_spatial::{
    ExclusionRegion, RouteRisk, RouteScorer, build_regions, cluster, limit_regions,
};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::SafestPathError;
use crate::tuning::SafetyTuning;

/// Share of the remaining budget the direct request may spend on networked
/// strategies before it must settle for the straight line.
const DIRECT_BUDGET_SHARE: f64 = 0.5;
/// Share of the remaining budget after which the avoidance request is
/// abandoned, leaving the rest for scoring and the response.
const AVOIDANCE_BUDGET_SHARE: f64 = 0.9;

/// Why the returned route was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Decision {
    /// Direct route scored at or below the low-risk threshold.
    DirectLowRisk,
    /// Direct route was risky but no cell qualified as a hotspot.
    NoHotspots,
    /// The avoidance route could not be obtained.
    AvoidanceFailed,
    /// Both routes were scored and the direct one was no worse.
    DirectSafer,
    /// Both routes were scored and the avoidance one was strictly safer.
    AvoidanceSafer,
    /// Offline grid search; no provider involved.
    GridSearch,
}

/// The chosen route with its score and the reasoning behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedRoute {
    /// The winning route.
    pub route: Route,
    /// Risk breakdown of the winning route.
    pub risk: RouteRisk,
    /// Why it won.
    pub decision: Decision,
    /// Score of the direct route, when one was fetched.
    pub direct_score: Option<f64>,
    /// Score of the avoidance route, when one was obtained.
    pub avoidance_score: Option<f64>,
    /// Exclusion regions sent with the avoidance request.
    pub exclusion_regions: usize,
}

/// Drives a [`RouteProvider`] and scores its routes against incidents.
#[derive(Clone)]
pub struct PathSelectionPolicy {
    provider: Arc<dyn RouteProvider>,
    tuning: SafetyTuning,
}

impl std::fmt::Debug for PathSelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathSelectionPolicy")
            .field("tuning", &self.tuning)
            .finish_non_exhaustive()
    }
}

impl PathSelectionPolicy {
    /// Creates a policy over `provider` with the given tuning.
    #[must_use]
    pub fn new(provider: Arc<dyn RouteProvider>, tuning: SafetyTuning) -> Self {
        Self { provider, tuning }
    }

    /// The tuning in effect.
    #[must_use]
    pub const fn tuning(&self) -> &SafetyTuning {
        &self.tuning
    }

    /// Exclusion regions for an incident set, highest priority first.
    #[must_use]
    pub fn exclusion_regions(&self, incidents: &[Incident]) -> Vec<ExclusionRegion> {
        let cells = cluster(incidents, &self.tuning.weights, &self.tuning.cluster);
        build_regions(&cells, &self.tuning.regions)
    }

    /// Computes the safest provider route between two points within the
    /// configured timeout.
    ///
    /// # Errors
    ///
    /// * [`SafestPathError::InvalidInput`] for out-of-range coordinates
    /// * [`SafestPathError::NoRouteFound`] if not even the direct route
    ///   could be obtained
    pub async fn compute_safest_route(
        &self,
        start: Point,
        end: Point,
        incidents: &[Incident],
    ) -> Result<SelectedRoute, SafestPathError> {
        let deadline = Instant::now() + self.tuning.timeout();
        self.compute_safest_route_by(start, end, incidents, deadline)
            .await
    }

    /// Like [`Self::compute_safest_route`], finishing by `deadline`.
    ///
    /// The direct request may use the first half of the remaining time on
    /// the network before falling back to the straight line; the avoidance
    /// request is abandoned at 90% of it.
    ///
    /// # Errors
    ///
    /// See [`Self::compute_safest_route`].
    pub async fn compute_safest_route_by(
        &self,
        start: Point,
        end: Point,
        incidents: &[Incident],
        deadline: Instant,
    ) -> Result<SelectedRoute, SafestPathError> {
        let now = Instant::now();
        let remaining = deadline.saturating_duration_since(now);
        let direct_deadline = now + remaining.mul_f64(DIRECT_BUDGET_SHARE);
        let avoidance_deadline = now + remaining.mul_f64(AVOIDANCE_BUDGET_SHARE);

        let scorer = RouteScorer::new(incidents, &self.tuning.weights, self.tuning.scoring);

        let direct = self
            .provider
            .get_route(&RouteRequest::direct(start, end).with_deadline(direct_deadline))
            .await?;
        let direct_risk = scorer.score_detailed(&direct.points);
        let direct_score = direct_risk.score;

        log::debug!(
            "Direct route {start} -> {end}: {} point(s), risk {direct_score:.3}",
            direct.points.len()
        );

        let keep_direct = |decision: Decision,
                           avoidance_score: Option<f64>,
                           exclusion_regions: usize| SelectedRoute {
            route: direct.clone(),
            risk: direct_risk.clone(),
            decision,
            direct_score: Some(direct_score),
            avoidance_score,
            exclusion_regions,
        };

        if direct_score <= self.tuning.low_risk_threshold {
            return Ok(keep_direct(Decision::DirectLowRisk, None, 0));
        }

        let regions = self.exclusion_regions(incidents);
        if regions.is_empty() {
            log::debug!("Direct route is risky but no hotspot qualifies for avoidance");
            return Ok(keep_direct(Decision::NoHotspots, None, 0));
        }

        let exclusions = limit_regions(&regions, self.tuning.max_exclusion_regions);
        log::debug!(
            "Requesting avoidance route around {} of {} region(s)",
            exclusions.len(),
            regions.len()
        );

        let avoidance = match self
            .provider
            .get_route(&RouteRequest::avoiding(start, end, exclusions).with_deadline(avoidance_deadline))
            .await
        {
            Ok(route) => route,
            Err(e) => {
                log::warn!("Avoidance route unavailable, keeping direct route: {e}");
                return Ok(keep_direct(Decision::AvoidanceFailed, None, exclusions.len()));
            }
        };

        let avoidance_risk = scorer.score_detailed(&avoidance.points);
        let avoidance_score = avoidance_risk.score;
        log::debug!("Avoidance route risk {avoidance_score:.3} vs direct {direct_score:.3}");

        if avoidance_score < direct_score {
            Ok(SelectedRoute {
                route: avoidance,
                risk: avoidance_risk,
                decision: Decision::AvoidanceSafer,
                direct_score: Some(direct_score),
                avoidance_score: Some(avoidance_score),
                exclusion_regions: exclusions.len(),
            })
        } else {
            Ok(keep_direct(
                Decision::DirectSafer,
                Some(avoidance_score),
                exclusions.len(),
            ))
        }
    }

    /// Computes a route with the offline grid search.
    ///
    /// # Errors
    ///
    /// * [`SafestPathError::InvalidInput`] for out-of-range coordinates
    /// * [`SafestPathError::NoRouteFound`] if either point is outside the
    ///   grid or the search is exhausted
    pub fn compute_grid_route(
        &self,
        start: Point,
        end: Point,
        incidents: &[Incident],
    ) -> Result<SelectedRoute, SafestPathError> {
        start.validate()?;
        end.validate()?;

        let grid = CostGrid::build(incidents, &self.tuning.weights, &self.tuning.grid);
        let route = Route::from_grid(find_path(&grid, start, end))
            .ok_or(SafestPathError::NoRouteFound)?;

        let scorer = RouteScorer::new(incidents, &self.tuning.weights, self.tuning.scoring);
        let risk = scorer.score_detailed(&route.points);

        Ok(SelectedRoute {
            route,
            risk,
            decision: Decision::GridSearch,
            direct_score: None,
            avoidance_score: None,
            exclusion_regions: 0,
        })
    }
}
