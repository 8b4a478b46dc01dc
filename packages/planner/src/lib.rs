#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Safest-path planning.
//!
//! [`SafestPathPlanner`] is the public entry point: it fetches recent
//! incidents from an [`IncidentSource`], hands them to the
//! [`PathSelectionPolicy`] (or the offline grid search), and packages the
//! chosen route with its metadata. The whole computation runs under one
//! end-to-end timeout.
//!
//! An unavailable incident source degrades to an empty incident set rather
//! than failing the request: the caller still gets the direct route.

pub mod policy;
pub mod source;
pub mod tuning;

use std::sync::Arc;
use std::time::{Duration, Instant};

use saferoute_crime_models::{Incident, InvalidPointError, Point};
use saferoute_routing::{RouteProvider, RoutingError};
use saferoute_routing_models::RouteSource;
use saferoute_spatial::ExclusionRegion;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub use policy::{Decision, PathSelectionPolicy, SelectedRoute};
pub use source::{IncidentSource, IncidentSourceError, JsonIncidentSource, StaticIncidentSource};
pub use tuning::{SafetyTuning, TuningError};

/// Lookback window used when the caller does not specify one.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;
/// Shortest accepted lookback window.
pub const MIN_LOOKBACK_DAYS: u32 = 1;
/// Longest accepted lookback window (ten years).
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

/// Errors surfaced to callers of the planner.
#[derive(Debug, Error)]
pub enum SafestPathError {
    /// Coordinates or parameters are out of range.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What is wrong.
        message: String,
    },

    /// No route could be produced.
    #[error("No route found")]
    NoRouteFound,

    /// The computation exceeded its time budget.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl From<InvalidPointError> for SafestPathError {
    fn from(err: InvalidPointError) -> Self {
        Self::InvalidInput {
            message: err.to_string(),
        }
    }
}

impl From<RoutingError> for SafestPathError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::InvalidInput(e) => e.into(),
            other => {
                log::debug!("Routing failed: {other}");
                Self::NoRouteFound
            }
        }
    }
}

/// How the route is produced.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlanningStrategy {
    /// Routing provider plus the path selection policy.
    #[default]
    Provider,
    /// Offline grid A* over a crime-weighted cost grid.
    Grid,
}

/// Metadata describing a computed path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafestPathMeta {
    /// Incidents the route was scored against.
    pub incident_count: usize,
    /// Vertices in the route.
    pub point_count: usize,
    /// Risk score of the returned route.
    pub risk: f64,
    /// Route vertices above the high-risk threshold.
    pub high_risk_points: usize,
    /// Length in metres.
    pub distance_m: f64,
    /// Travel time in seconds (0 for synthetic routes).
    pub duration_s: f64,
    /// Strategy that planned the route.
    pub strategy: PlanningStrategy,
    /// Where the geometry came from.
    pub source: RouteSource,
    /// Why this route was returned.
    pub decision: Decision,
    /// Exclusion regions sent to the provider.
    pub exclusion_regions: usize,
    /// `false` when the incident source failed and the route was planned
    /// without incidents.
    pub incidents_available: bool,
}

/// A computed path: ordered coordinates plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafestPath {
    /// Vertices from start to end.
    pub route: Vec<Point>,
    /// Metadata.
    pub meta: SafestPathMeta,
}

impl SafestPath {
    fn new(
        selected: SelectedRoute,
        strategy: PlanningStrategy,
        incident_count: usize,
        incidents_available: bool,
    ) -> Self {
        let SelectedRoute {
            route,
            risk,
            decision,
            exclusion_regions,
            ..
        } = selected;

        Self {
            meta: SafestPathMeta {
                incident_count,
                point_count: route.points.len(),
                risk: risk.score,
                high_risk_points: risk.high_risk_points,
                distance_m: route.distance_m,
                duration_s: route.duration_s,
                strategy,
                source: route.source,
                decision,
                exclusion_regions,
                incidents_available,
            },
            route: route.points,
        }
    }
}

/// Checks a lookback window against the accepted range.
///
/// # Errors
///
/// Returns [`SafestPathError::InvalidInput`] outside
/// `MIN_LOOKBACK_DAYS..=MAX_LOOKBACK_DAYS`.
pub fn validate_lookback(lookback_days: u32) -> Result<(), SafestPathError> {
    if (MIN_LOOKBACK_DAYS..=MAX_LOOKBACK_DAYS).contains(&lookback_days) {
        Ok(())
    } else {
        Err(SafestPathError::InvalidInput {
            message: format!(
                "lookback_days must be between {MIN_LOOKBACK_DAYS} and {MAX_LOOKBACK_DAYS} (got {lookback_days})"
            ),
        })
    }
}

/// Computes safest paths from an incident source and a route provider.
///
/// Cheap to share behind an `Arc`; every request is independent.
#[derive(Clone)]
pub struct SafestPathPlanner {
    policy: PathSelectionPolicy,
    incidents: Arc<dyn IncidentSource>,
}

impl std::fmt::Debug for SafestPathPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafestPathPlanner")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SafestPathPlanner {
    /// Creates a planner over a route provider and an incident source.
    #[must_use]
    pub fn new(
        provider: Arc<dyn RouteProvider>,
        incidents: Arc<dyn IncidentSource>,
        tuning: SafetyTuning,
    ) -> Self {
        Self {
            policy: PathSelectionPolicy::new(provider, tuning),
            incidents,
        }
    }

    /// The tuning in effect.
    #[must_use]
    pub const fn tuning(&self) -> &SafetyTuning {
        self.policy.tuning()
    }

    /// Computes the safest provider route between `start` and `end`,
    /// scored against incidents from the last `lookback_days` days.
    ///
    /// # Errors
    ///
    /// * [`SafestPathError::InvalidInput`] for out-of-range coordinates or
    ///   lookback window
    /// * [`SafestPathError::NoRouteFound`] if no route could be produced
    /// * [`SafestPathError::Timeout`] if the time budget ran out
    pub async fn compute_safest_path(
        &self,
        start: Point,
        end: Point,
        lookback_days: u32,
    ) -> Result<SafestPath, SafestPathError> {
        self.compute_with_strategy(start, end, lookback_days, PlanningStrategy::Provider)
            .await
    }

    /// Like [`Self::compute_safest_path`] with an explicit strategy.
    ///
    /// # Errors
    ///
    /// See [`Self::compute_safest_path`].
    pub async fn compute_with_strategy(
        &self,
        start: Point,
        end: Point,
        lookback_days: u32,
        strategy: PlanningStrategy,
    ) -> Result<SafestPath, SafestPathError> {
        validate_lookback(lookback_days)?;
        start.validate()?;
        end.validate()?;

        let budget = self.tuning().timeout();
        let deadline = Instant::now() + budget;
        tokio::time::timeout(budget, self.plan(start, end, lookback_days, strategy, deadline))
            .await
            .map_err(|_| {
                log::warn!("Safest path {start} -> {end} timed out after {budget:?}");
                SafestPathError::Timeout(budget)
            })?
    }

    async fn plan(
        &self,
        start: Point,
        end: Point,
        lookback_days: u32,
        strategy: PlanningStrategy,
        deadline: Instant,
    ) -> Result<SafestPath, SafestPathError> {
        let (incidents, available) = self.load_incidents(lookback_days).await;

        let selected = match strategy {
            PlanningStrategy::Provider => {
                self.policy
                    .compute_safest_route_by(start, end, &incidents, deadline)
                    .await?
            }
            PlanningStrategy::Grid => self.policy.compute_grid_route(start, end, &incidents)?,
        };

        log::info!(
            "Planned {start} -> {end} via {strategy}: {} point(s), risk {:.3}, {}",
            selected.route.points.len(),
            selected.risk.score,
            selected.decision
        );

        Ok(SafestPath::new(
            selected,
            strategy,
            incidents.len(),
            available,
        ))
    }

    /// Exclusion regions derived from the last `lookback_days` days of
    /// incidents, highest priority first.
    ///
    /// # Errors
    ///
    /// * [`SafestPathError::InvalidInput`] for an out-of-range lookback
    /// * [`SafestPathError::Timeout`] if the time budget ran out
    pub async fn hotspots(
        &self,
        lookback_days: u32,
    ) -> Result<Vec<ExclusionRegion>, SafestPathError> {
        validate_lookback(lookback_days)?;

        let budget = self.tuning().timeout();
        let (incidents, _) = tokio::time::timeout(budget, self.load_incidents(lookback_days))
            .await
            .map_err(|_| SafestPathError::Timeout(budget))?;

        Ok(self.policy.exclusion_regions(&incidents))
    }

    async fn load_incidents(&self, lookback_days: u32) -> (Vec<Incident>, bool) {
        match self.incidents.fetch_incidents(lookback_days).await {
            Ok(incidents) => (incidents, true),
            Err(e) => {
                log::error!("Incident source unavailable, planning without incidents: {e}");
                (Vec::new(), false)
            }
        }
    }
}
