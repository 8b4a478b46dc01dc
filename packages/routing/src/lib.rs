#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Road routing provider client.
//!
//! Acquires a road-following route between two points from an
//! OpenRouteService-compatible directions API. Strategies are tried in a
//! fixed order until one succeeds:
//!
//! 1. **`directions_geojson`**: structured JSON body (with avoid
//!    polygons), feature-collection response.
//! 2. **`directions_json`**: same body against the flat-routes endpoint,
//!    used when the first shape is rejected.
//! 3. **`directions_query`**: query-string GET; skipped when the request
//!    carries exclusions.
//! 4. **`straight_line`**: synthetic two-point route so callers always get
//!    an answer, unless they require a road-following result.
//!
//! Each networked strategy is retried with exponential backoff via
//! [`retry::send_json`]. When the request carries a deadline, networked
//! strategies are cut off at it so the straight line can still be returned
//! in time. Providers are configured by TOML files embedded
//! through the [`service_registry`].

pub mod client;
pub mod parse;
pub mod retry;
pub mod service_registry;

#[cfg(test)]
mod test_support;

use saferoute_crime_models::InvalidPointError;
use saferoute_routing_models::{Route, RouteRequest};
use thiserror::Error;

pub use client::RouteProviderClient;
pub use service_registry::{ProviderConfig, RetryPolicy};

/// Errors from routing operations.
///
/// Only [`RoutingError::InvalidInput`] and [`RoutingError::NoRouteFound`]
/// escape [`RouteProvider::get_route`]; the rest describe individual
/// strategy failures and are logged.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Start or end coordinates are out of range.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InvalidPointError),

    /// Every applicable strategy failed.
    #[error("No route found")]
    NoRouteFound,

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider rejected the request shape (HTTP 4xx other than 429).
    #[error("Request rejected with HTTP {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Body preview.
        message: String,
    },

    /// Provider responded but without a usable route.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// The request deadline passed before the strategy finished.
    #[error("Routing deadline reached")]
    DeadlineReached,

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}

/// Anything that can produce a route for a [`RouteRequest`].
///
/// Implemented by [`RouteProviderClient`]; the path selection policy only
/// depends on this trait, so tests can substitute scripted providers.
#[async_trait::async_trait]
pub trait RouteProvider: Send + Sync {
    /// Returns a non-empty route.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::InvalidInput`] for out-of-range coordinates
    /// (before any network call) and [`RoutingError::NoRouteFound`] when no
    /// strategy produced a route.
    async fn get_route(&self, request: &RouteRequest<'_>) -> Result<Route, RoutingError>;
}
