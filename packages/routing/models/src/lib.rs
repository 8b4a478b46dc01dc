#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route types shared by the provider client, the grid search, and the
//! path selection policy.

use std::time::Instant;

use saferoute_crime_models::Point;
use saferoute_spatial::{ExclusionRegion, path_length_m};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A named way of obtaining a route from the routing provider, in the
/// order the client tries them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RouteStrategy {
    /// Structured JSON body, feature-collection response.
    DirectionsGeojson,
    /// Structured JSON body, flat-routes response.
    DirectionsJson,
    /// Query-string request; cannot carry avoid polygons.
    DirectionsQuery,
    /// Synthetic two-point line between start and end.
    StraightLine,
}

impl RouteStrategy {
    /// Every strategy in default attempt order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::DirectionsGeojson,
            Self::DirectionsJson,
            Self::DirectionsQuery,
            Self::StraightLine,
        ]
    }

    /// Whether the strategy needs the network.
    #[must_use]
    pub const fn is_networked(self) -> bool {
        !matches!(self, Self::StraightLine)
    }
}

/// Where a route's geometry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RouteSource {
    /// Road-following geometry from the routing provider.
    Provider {
        /// Strategy that produced it.
        strategy: RouteStrategy,
    },
    /// Degenerate straight line.
    StraightLine,
    /// Offline grid search.
    Grid,
}

impl RouteSource {
    /// Whether the route follows a road network.
    #[must_use]
    pub const fn is_road_following(self) -> bool {
        matches!(self, Self::Provider { .. })
    }
}

/// An ordered, non-empty sequence of points with travel metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Vertices from start to end.
    pub points: Vec<Point>,
    /// Length in metres.
    pub distance_m: f64,
    /// Expected travel time in seconds (0 for synthetic routes).
    pub duration_s: f64,
    /// Origin of the geometry.
    pub source: RouteSource,
}

impl Route {
    /// The degenerate two-point route between `start` and `end`.
    #[must_use]
    pub fn straight_line(start: Point, end: Point) -> Self {
        let points = vec![start, end];
        Self {
            distance_m: path_length_m(&points),
            points,
            duration_s: 0.0,
            source: RouteSource::StraightLine,
        }
    }

    /// A route from grid-search output, or `None` when the search found
    /// no path.
    #[must_use]
    pub fn from_grid(points: Vec<Point>) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(Self {
            distance_m: path_length_m(&points),
            points,
            duration_s: 0.0,
            source: RouteSource::Grid,
        })
    }
}

/// Everything the provider needs to produce one route.
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    /// Origin.
    pub start: Point,
    /// Destination.
    pub end: Point,
    /// Areas to avoid, highest priority first.
    pub exclusions: &'a [ExclusionRegion],
    /// Refuse the straight-line fallback.
    pub require_road: bool,
    /// Instant by which networked strategies must give up, leaving time
    /// for the straight-line fallback.
    pub deadline: Option<Instant>,
}

impl<'a> RouteRequest<'a> {
    /// A plain request with no exclusions that accepts a straight line.
    #[must_use]
    pub const fn direct(start: Point, end: Point) -> Self {
        Self {
            start,
            end,
            exclusions: &[],
            require_road: false,
            deadline: None,
        }
    }

    /// A road-only request avoiding `exclusions`.
    #[must_use]
    pub const fn avoiding(start: Point, end: Point, exclusions: &'a [ExclusionRegion]) -> Self {
        Self {
            start,
            end,
            exclusions,
            require_road: true,
            deadline: None,
        }
    }

    /// The same request bounded by `deadline`.
    #[must_use]
    pub const fn with_deadline(self, deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..self
        }
    }

    /// Whether the deadline has already passed.
    #[must_use]
    pub fn is_past_deadline(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}
