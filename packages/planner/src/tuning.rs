//! Empirical tuning constants, loadable from a TOML file.
//!
//! Every field has a default, so a tuning file only needs the values it
//! overrides:
//!
//! ```toml
//! low_risk_threshold = 0.8
//!
//! [weights]
//! violent = 4.0
//!
//! [scoring]
//! cutoff_m = 1500.0
//! ```

use std::path::Path;
use std::time::Duration;

use saferoute_crime_models::{InvalidWeightsError, SeverityWeights};
use saferoute_grid::GridTuning;
use saferoute_spatial::{ClusterTuning, RegionTuning, ScoringTuning};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming an optional tuning file.
pub const TUNING_ENV_VAR: &str = "SAFEROUTE_TUNING";

/// Errors loading a tuning file.
#[derive(Debug, Error)]
pub enum TuningError {
    /// File could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML for [`SafetyTuning`].
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Values parse but are inconsistent.
    #[error("Invalid tuning: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

impl From<InvalidWeightsError> for TuningError {
    fn from(err: InvalidWeightsError) -> Self {
        Self::Invalid {
            message: err.to_string(),
        }
    }
}

/// All knobs of the safest-path pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyTuning {
    /// Severity per tier.
    pub weights: SeverityWeights,
    /// Hotspot lattice.
    pub cluster: ClusterTuning,
    /// Exclusion region thresholds and radii.
    pub regions: RegionTuning,
    /// Route risk scoring.
    pub scoring: ScoringTuning,
    /// Offline grid search.
    pub grid: GridTuning,
    /// A direct route scoring at or below this is accepted as is.
    pub low_risk_threshold: f64,
    /// Most exclusion regions sent with an avoidance request.
    pub max_exclusion_regions: usize,
    /// End-to-end budget for one request, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for SafetyTuning {
    fn default() -> Self {
        Self {
            weights: SeverityWeights::default(),
            cluster: ClusterTuning::default(),
            regions: RegionTuning::default(),
            scoring: ScoringTuning::default(),
            grid: GridTuning::default(),
            low_risk_threshold: 0.5,
            max_exclusion_regions: 20,
            timeout_ms: 30_000,
        }
    }
}

impl SafetyTuning {
    /// End-to-end request budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// * [`TuningError::Toml`] if the document does not deserialize
    /// * [`TuningError::Invalid`] if the values are inconsistent
    pub fn from_toml_str(source: &str) -> Result<Self, TuningError> {
        let tuning: Self = toml::from_str(source)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Reads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a [`TuningError`] if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TuningError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let tuning = Self::from_toml_str(&source)?;
        log::info!("Loaded safety tuning from {}", path.display());
        Ok(tuning)
    }

    /// Loads the file named by `SAFEROUTE_TUNING`, or the defaults when the
    /// variable is unset.
    ///
    /// # Errors
    ///
    /// Returns a [`TuningError`] if the named file cannot be loaded.
    pub fn from_env() -> Result<Self, TuningError> {
        match std::env::var(TUNING_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    /// Checks cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`TuningError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), TuningError> {
        self.weights.validate()?;

        let positive = [
            ("cluster.cell_edge_deg", self.cluster.cell_edge_deg),
            ("scoring.cutoff_m", self.scoring.cutoff_m),
            ("scoring.decay_m", self.scoring.decay_m),
            ("regions.base_radius_m", self.regions.base_radius_m),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(format!("{name} must be positive (got {value})")));
            }
        }

        if self.regions.vertices < 3 {
            return Err(invalid(format!(
                "regions.vertices must be at least 3 (got {})",
                self.regions.vertices
            )));
        }
        if self.grid.width == 0 || self.grid.height == 0 {
            return Err(invalid("grid dimensions must be non-zero".to_string()));
        }
        let bounds = self.grid.bounds;
        if bounds.south >= bounds.north || bounds.west >= bounds.east {
            return Err(invalid("grid bounds are empty".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(invalid("timeout_ms must be non-zero".to_string()));
        }

        Ok(())
    }
}

fn invalid(message: String) -> TuningError {
    TuningError::Invalid { message }
}
