//! Compile-time registry of routing provider configurations.
//!
//! Each provider is defined in a TOML file under `services/`. The registry
//! embeds these at compile time; [`ProviderConfig::from_env`] picks one and
//! overlays credentials and endpoint overrides from the environment.

use std::time::Duration;

use saferoute_routing_models::RouteStrategy;
use serde::Deserialize;

use crate::RoutingError;

/// A routing provider configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Unique identifier (e.g., `"openrouteservice"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// API base URL without a trailing path (e.g.
    /// `"https://api.openrouteservice.org"`).
    pub base_url: String,
    /// Routing profile (e.g., `"driving-car"`).
    pub profile: String,
    /// API key, sent as the `Authorization` header (or `api_key` query
    /// parameter for query-string requests).
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Most avoid polygons the provider accepts in one request.
    #[serde(default = "default_max_exclusion_regions")]
    pub max_exclusion_regions: usize,
    /// Networked strategies in attempt order. The straight-line fallback is
    /// always appended by the client and must not be listed here.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<RouteStrategy>,
    /// Retry behaviour for each networked strategy.
    pub retry: RetryPolicy,
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per strategy, including the first.
    pub max_attempts: u32,
    /// Delay slept before the very first attempt, to respect provider rate
    /// limits.
    pub initial_delay_ms: u64,
    /// Backoff before retry `n` is `backoff_base_ms · 2^(n-1)`.
    pub backoff_base_ms: u64,
}

impl RetryPolicy {
    /// Delay before the first attempt.
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 250,
            backoff_base_ms: 500,
        }
    }
}

const fn default_max_exclusion_regions() -> usize {
    20
}

fn default_strategies() -> Vec<RouteStrategy> {
    RouteStrategy::all()
        .iter()
        .copied()
        .filter(|s| s.is_networked())
        .collect()
}

/// Provider used when `ROUTING_PROVIDER` is not set.
pub const DEFAULT_PROVIDER_ID: &str = "openrouteservice";

// ── Compile-time embedded TOML files ────────────────────────────────

const SERVICE_TOMLS: &[(&str, &str)] = &[
    (
        "openrouteservice",
        include_str!("../services/openrouteservice.toml"),
    ),
    (
        "openrouteservice_local",
        include_str!("../services/openrouteservice_local.toml"),
    ),
];

#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 2;

/// Returns every embedded provider configuration.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_providers() -> Vec<ProviderConfig> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse routing provider '{name}': {e}"))
        })
        .collect()
}

/// Looks up an embedded provider by id.
#[must_use]
pub fn provider(id: &str) -> Option<ProviderConfig> {
    all_providers().into_iter().find(|p| p.id == id)
}

impl ProviderConfig {
    /// Selects a provider and applies environment overrides:
    ///
    /// * `ROUTING_PROVIDER`: provider id (default [`DEFAULT_PROVIDER_ID`])
    /// * `ROUTING_API_KEY` or `ORS_API_KEY`: API key
    /// * `ROUTING_BASE_URL`: base URL override
    /// * `ROUTING_PROFILE`: profile override
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Config`] if the requested provider id is not
    /// registered.
    pub fn from_env() -> Result<Self, RoutingError> {
        let id =
            std::env::var("ROUTING_PROVIDER").unwrap_or_else(|_| DEFAULT_PROVIDER_ID.to_string());
        let mut config = provider(&id).ok_or_else(|| RoutingError::Config {
            message: format!("unknown routing provider '{id}'"),
        })?;

        if let Ok(key) = std::env::var("ROUTING_API_KEY").or_else(|_| std::env::var("ORS_API_KEY"))
        {
            if !key.trim().is_empty() {
                config.api_key = Some(key);
            }
        }
        if let Ok(base_url) = std::env::var("ROUTING_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(profile) = std::env::var("ROUTING_PROFILE") {
            config.profile = profile;
        }

        if config.api_key.is_none() && config.base_url.starts_with("https://api.") {
            log::warn!(
                "No routing API key set for '{}'; requests will likely be rejected",
                config.id
            );
        }

        Ok(config)
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Base URL without trailing slashes.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn loads_all_providers() {
        assert_eq!(all_providers().len(), EXPECTED_SERVICE_COUNT);
    }

    #[test]
    fn provider_ids_are_unique() {
        let mut seen = BTreeSet::new();
        for p in &all_providers() {
            assert!(seen.insert(p.id.clone()), "Duplicate provider ID: {}", p.id);
        }
    }

    #[test]
    fn providers_have_required_fields() {
        for p in &all_providers() {
            assert!(!p.name.is_empty(), "Provider {} has empty name", p.id);
            assert!(!p.base_url.is_empty(), "Provider {} has empty base_url", p.id);
            assert!(!p.profile.is_empty(), "Provider {} has empty profile", p.id);
            assert!(p.retry.max_attempts >= 1, "Provider {} never attempts", p.id);
            assert!(
                !p.strategies.contains(&RouteStrategy::StraightLine),
                "Provider {} lists the straight-line fallback",
                p.id
            );
        }
    }

    #[test]
    fn default_provider_is_registered() {
        assert!(provider(DEFAULT_PROVIDER_ID).is_some());
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 250,
            backoff_base_ms: 500,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.initial_delay(), Duration::from_millis(250));
    }

    #[test]
    fn base_trims_trailing_slash() {
        let mut config = provider(DEFAULT_PROVIDER_ID).unwrap();
        config.base_url = "http://localhost:8080/ors/".to_string();
        assert_eq!(config.base(), "http://localhost:8080/ors");
    }
}
