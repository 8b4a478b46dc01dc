//! Normalization of incident records at the data-model boundary.
//!
//! Stores disagree on where coordinates live. A record may carry flat
//! `latitude`/`longitude` (or `lat`/`lng`/`lon`) fields, a nested
//! `location` object with the same fields, or a nested `GeoJSON` point
//! (`{"type": "Point", "coordinates": [lng, lat]}`). Coordinates may be
//! numbers or numeric strings. [`RawIncident`] accepts all of them and
//! [`Incident::try_from`] turns it into the canonical form or rejects it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{InvalidPointError, Point};

/// A crime incident with a valid position and a free-text category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Where the incident occurred.
    pub position: Point,
    /// Category label as reported by the source (e.g. `"robbery"`).
    pub category: String,
}

impl Incident {
    /// Creates an incident at the given coordinates.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, category: impl Into<String>) -> Self {
        Self {
            position: Point::new(latitude, longitude),
            category: category.into(),
        }
    }
}

/// A coordinate value that may be encoded as a number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    /// Plain JSON number.
    Number(f64),
    /// Numeric string (e.g. `"33.6844"`).
    Text(String),
}

impl Coordinate {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Nested `location` object of an incident record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLocation {
    #[serde(default)]
    latitude: Option<Coordinate>,
    #[serde(default)]
    lat: Option<Coordinate>,
    #[serde(default)]
    longitude: Option<Coordinate>,
    #[serde(default)]
    lng: Option<Coordinate>,
    #[serde(default)]
    lon: Option<Coordinate>,
    /// `GeoJSON` point coordinates, `[lng, lat]`.
    #[serde(default)]
    coordinates: Option<Vec<Coordinate>>,
}

impl RawLocation {
    fn position(&self) -> (Option<f64>, Option<f64>) {
        if let Some(coords) = &self.coordinates {
            let lng = coords.first().and_then(Coordinate::as_f64);
            let lat = coords.get(1).and_then(Coordinate::as_f64);
            if lat.is_some() && lng.is_some() {
                return (lat, lng);
            }
        }
        (
            first_parsed(&[&self.latitude, &self.lat]),
            first_parsed(&[&self.longitude, &self.lng, &self.lon]),
        )
    }
}

/// An incident record as it arrives from an external store, before
/// normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIncident {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    crime_type: Option<String>,
    #[serde(default, rename = "crime_type")]
    crime_type_snake: Option<String>,
    #[serde(default)]
    offense: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    latitude: Option<Coordinate>,
    #[serde(default)]
    lat: Option<Coordinate>,
    #[serde(default)]
    longitude: Option<Coordinate>,
    #[serde(default)]
    lng: Option<Coordinate>,
    #[serde(default)]
    lon: Option<Coordinate>,
    #[serde(default)]
    location: Option<RawLocation>,
    #[serde(default)]
    occurred_at: Option<String>,
    #[serde(default, rename = "occurred_at")]
    occurred_at_snake: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

impl RawIncident {
    /// Builds a flat raw record, as produced by relational stores.
    #[must_use]
    pub fn flat(category: Option<String>, latitude: Option<f64>, longitude: Option<f64>) -> Self {
        Self {
            category,
            latitude: latitude.map(Coordinate::Number),
            longitude: longitude.map(Coordinate::Number),
            ..Self::default()
        }
    }

    /// When the incident occurred, if the store reports it (RFC 3339 or
    /// `YYYY-MM-DD`), from `occurredAt`, `occurred_at`, or `date`.
    #[must_use]
    pub fn occurred_at(&self) -> Option<&str> {
        self.occurred_at
            .as_deref()
            .or(self.occurred_at_snake.as_deref())
            .or(self.date.as_deref())
    }

    fn category(&self) -> String {
        self.category
            .as_ref()
            .or(self.crime_type.as_ref())
            .or(self.crime_type_snake.as_ref())
            .or(self.offense.as_ref())
            .or(self.kind.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    fn position(&self) -> (Option<f64>, Option<f64>) {
        let flat_lat = first_parsed(&[&self.latitude, &self.lat]);
        let flat_lng = first_parsed(&[&self.longitude, &self.lng, &self.lon]);
        if flat_lat.is_some() && flat_lng.is_some() {
            return (flat_lat, flat_lng);
        }
        self.location
            .as_ref()
            .map_or((flat_lat, flat_lng), RawLocation::position)
    }
}

fn first_parsed(candidates: &[&Option<Coordinate>]) -> Option<f64> {
    candidates
        .iter()
        .find_map(|c| c.as_ref().and_then(Coordinate::as_f64))
}

/// Reasons an incident record cannot be normalized.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IncidentParseError {
    /// No latitude in any supported shape.
    #[error("missing or unparseable latitude")]
    MissingLatitude,
    /// No longitude in any supported shape.
    #[error("missing or unparseable longitude")]
    MissingLongitude,
    /// Coordinates parsed but are out of range.
    #[error(transparent)]
    OutOfRange(#[from] InvalidPointError),
    /// The record is not an object of the expected shape.
    #[error("malformed incident record: {message}")]
    Malformed {
        /// Deserializer message.
        message: String,
    },
}

impl TryFrom<RawIncident> for Incident {
    type Error = IncidentParseError;

    fn try_from(raw: RawIncident) -> Result<Self, Self::Error> {
        let (lat, lng) = raw.position();
        let latitude = lat.ok_or(IncidentParseError::MissingLatitude)?;
        let longitude = lng.ok_or(IncidentParseError::MissingLongitude)?;
        let position = Point::new(latitude, longitude);
        position.validate()?;

        Ok(Self {
            position,
            category: raw.category(),
        })
    }
}

impl TryFrom<&serde_json::Value> for Incident {
    type Error = IncidentParseError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        let raw = RawIncident::deserialize(value).map_err(|e| IncidentParseError::Malformed {
            message: e.to_string(),
        })?;
        Self::try_from(raw)
    }
}

/// Normalizes a batch of JSON records, silently dropping any that cannot
/// be parsed. Partial data is expected, so rejects are only logged at
/// debug level.
#[must_use]
pub fn normalize_incidents(values: &[serde_json::Value]) -> Vec<Incident> {
    let mut skipped = 0usize;
    let incidents: Vec<Incident> = values
        .iter()
        .filter_map(|value| match Incident::try_from(value) {
            Ok(incident) => Some(incident),
            Err(e) => {
                log::debug!("Skipping incident record: {e}");
                skipped += 1;
                None
            }
        })
        .collect();

    if skipped > 0 {
        log::debug!(
            "Normalized {} incident(s), skipped {skipped} unparseable",
            incidents.len()
        );
    }

    incidents
}
