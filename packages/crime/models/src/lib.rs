#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident, point, and severity types shared by every safest-path crate.
//!
//! Incidents arrive from external stores in several shapes (flat
//! `latitude`/`longitude` fields, a nested `location` object, or a `GeoJSON`
//! point). The [`incident`] module normalizes all of them into a single
//! canonical [`Incident`] so the rest of the pipeline never sees the
//! variance.

pub mod incident;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub use incident::{Incident, IncidentParseError, RawIncident, normalize_incidents};

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Latitude in degrees, -90 to 90.
    pub latitude: f64,
    /// Longitude in degrees, -180 to 180.
    pub longitude: f64,
}

impl Point {
    /// Creates a new point. Does not validate; see [`Point::validate`].
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Checks that both components are finite and within the valid
    /// latitude/longitude ranges.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPointError`] naming the offending component.
    pub fn validate(&self) -> Result<(), InvalidPointError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(InvalidPointError::Latitude {
                value: self.latitude,
            });
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(InvalidPointError::Longitude {
                value: self.longitude,
            });
        }
        Ok(())
    }

    /// Returns `[longitude, latitude]`, the axis order routing providers
    /// and `GeoJSON` expect.
    #[must_use]
    pub const fn lng_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Error returned when a [`Point`] is outside the valid coordinate ranges.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidPointError {
    /// Latitude is non-finite or outside -90..=90.
    #[error("invalid latitude {value}: expected -90 to 90")]
    Latitude {
        /// The rejected latitude.
        value: f64,
    },
    /// Longitude is non-finite or outside -180..=180.
    #[error("invalid longitude {value}: expected -180 to 180")]
    Longitude {
        /// The rejected longitude.
        value: f64,
    },
}

/// Coarse severity tier of an incident category.
///
/// Only the ordering `Violent > Property > Other` is meaningful to other
/// components; the numeric weights live in [`SeverityWeights`].
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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityTier {
    /// Anything not listed below, including empty or unknown labels
    Other,
    /// Theft, burglary, auto theft
    Property,
    /// Homicide, murder, assault, robbery, rape
    Violent,
}

const VIOLENT_CATEGORIES: &[&str] = &["homicide", "murder", "assault", "robbery", "rape"];
const PROPERTY_CATEGORIES: &[&str] = &["theft", "burglary", "auto theft"];

impl SeverityTier {
    /// Classifies a free-text category label.
    ///
    /// Matching is case-insensitive and tolerant of surrounding whitespace
    /// and `_`/`-` separators (`"AUTO_THEFT"` is property).
    #[must_use]
    pub fn classify(category: &str) -> Self {
        let normalized = normalize_label(category);
        if VIOLENT_CATEGORIES.contains(&normalized.as_str()) {
            Self::Violent
        } else if PROPERTY_CATEGORIES.contains(&normalized.as_str()) {
            Self::Property
        } else {
            Self::Other
        }
    }
}

fn normalize_label(category: &str) -> String {
    category
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Numeric weight per [`SeverityTier`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
    /// Weight of violent incidents.
    pub violent: f64,
    /// Weight of property incidents.
    pub property: f64,
    /// Weight of everything else.
    pub other: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            violent: 3.0,
            property: 2.0,
            other: 1.0,
        }
    }
}

/// Error returned when severity weights break `violent > property > other > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("severity weights must satisfy violent > property > other > 0 (got {violent}, {property}, {other})")]
pub struct InvalidWeightsError {
    /// Rejected violent weight.
    pub violent: f64,
    /// Rejected property weight.
    pub property: f64,
    /// Rejected default weight.
    pub other: f64,
}

impl SeverityWeights {
    /// Creates a weight table, enforcing the tier ordering.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidWeightsError`] unless `violent > property > other > 0`.
    pub fn new(violent: f64, property: f64, other: f64) -> Result<Self, InvalidWeightsError> {
        let weights = Self {
            violent,
            property,
            other,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Checks the tier ordering of an existing table (e.g. one deserialized
    /// from a tuning file).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidWeightsError`] unless `violent > property > other > 0`.
    pub fn validate(&self) -> Result<(), InvalidWeightsError> {
        if self.violent > self.property && self.property > self.other && self.other > 0.0 {
            Ok(())
        } else {
            Err(InvalidWeightsError {
                violent: self.violent,
                property: self.property,
                other: self.other,
            })
        }
    }

    /// Returns the weight of a tier.
    #[must_use]
    pub const fn for_tier(&self, tier: SeverityTier) -> f64 {
        match tier {
            SeverityTier::Violent => self.violent,
            SeverityTier::Property => self.property,
            SeverityTier::Other => self.other,
        }
    }

    /// Returns the weight of a free-text category label.
    #[must_use]
    pub fn weight(&self, category: &str) -> f64 {
        self.for_tier(SeverityTier::classify(category))
    }
}

/// Returns the default weight of a free-text category label.
///
/// Total and deterministic: unknown or empty labels get the lowest weight,
/// never an error.
#[must_use]
pub fn severity_weight(category: &str) -> f64 {
    SeverityWeights::default().weight(category)
}
