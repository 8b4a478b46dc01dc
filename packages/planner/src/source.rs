//! Where incidents come from.
//!
//! The planner only sees the [`IncidentSource`] trait. This module provides
//! an in-memory source and a JSON document source; the relational store
//! lives in `saferoute_database`.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use saferoute_crime_models::{Incident, RawIncident};
use thiserror::Error;

/// Errors fetching incidents.
#[derive(Debug, Error)]
pub enum IncidentSourceError {
    /// Reading the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not JSON of the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The relational store failed.
    #[error("Database error: {message}")]
    Database {
        /// Driver error text.
        message: String,
    },
}

/// Supplies the incidents of the last `lookback_days` days.
#[async_trait]
pub trait IncidentSource: Send + Sync {
    /// Fetches recent incidents. Records without usable coordinates are
    /// skipped rather than reported.
    ///
    /// # Errors
    ///
    /// Returns an [`IncidentSourceError`] if the backing store is
    /// unavailable.
    async fn fetch_incidents(&self, lookback_days: u32)
    -> Result<Vec<Incident>, IncidentSourceError>;
}

/// A fixed incident list, returned regardless of the lookback window.
#[derive(Debug, Clone, Default)]
pub struct StaticIncidentSource {
    incidents: Vec<Incident>,
}

impl StaticIncidentSource {
    /// Serves `incidents` on every fetch.
    #[must_use]
    pub const fn new(incidents: Vec<Incident>) -> Self {
        Self { incidents }
    }
}

#[async_trait]
impl IncidentSource for StaticIncidentSource {
    async fn fetch_incidents(
        &self,
        _lookback_days: u32,
    ) -> Result<Vec<Incident>, IncidentSourceError> {
        Ok(self.incidents.clone())
    }
}

/// Incident records stored as a JSON array (or `{"incidents": [...]}`) in
/// a file, re-read on every fetch.
///
/// Records carrying a parseable `occurredAt`/`date` older than the lookback
/// window are dropped; records without a timestamp are kept.
#[derive(Debug, Clone)]
pub struct JsonIncidentSource {
    path: PathBuf,
}

impl JsonIncidentSource {
    /// Reads incidents from the JSON file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl IncidentSource for JsonIncidentSource {
    async fn fetch_incidents(
        &self,
        lookback_days: u32,
    ) -> Result<Vec<Incident>, IncidentSourceError> {
        let body = tokio::fs::read_to_string(&self.path).await?;
        let document: serde_json::Value = serde_json::from_str(&body)?;
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(lookback_days));

        let incidents = parse_document(document, cutoff)?;
        log::debug!(
            "Loaded {} incident(s) from {}",
            incidents.len(),
            self.path.display()
        );
        Ok(incidents)
    }
}

/// Normalizes every record of a JSON incident document, dropping records
/// that occurred before `cutoff`.
///
/// # Errors
///
/// Returns [`IncidentSourceError::Json`] if the document is neither an
/// array nor an object with an `incidents` array.
pub fn parse_document(
    document: serde_json::Value,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Incident>, IncidentSourceError> {
    let records = match document {
        serde_json::Value::Array(records) => records,
        serde_json::Value::Object(mut map) => match map.remove("incidents") {
            Some(serde_json::Value::Array(records)) => records,
            _ => {
                return Err(IncidentSourceError::Json(serde::de::Error::custom(
                    "expected an object with an `incidents` array",
                )));
            }
        },
        _ => {
            return Err(IncidentSourceError::Json(serde::de::Error::custom(
                "expected an array of incidents",
            )));
        }
    };

    let total = records.len();
    let mut stale = 0usize;
    let mut invalid = 0usize;
    let mut incidents = Vec::with_capacity(total);

    for record in records {
        let raw: RawIncident = match serde_json::from_value(record) {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("Skipping malformed incident record: {e}");
                invalid += 1;
                continue;
            }
        };

        let occurred = raw.occurred_at().and_then(parse_timestamp);
        if occurred.is_some_and(|at| at < cutoff) {
            stale += 1;
            continue;
        }

        match Incident::try_from(raw) {
            Ok(incident) => incidents.push(incident),
            Err(e) => {
                log::debug!("Skipping incident record: {e}");
                invalid += 1;
            }
        }
    }

    if invalid > 0 || stale > 0 {
        log::info!(
            "Kept {} of {total} incident record(s) ({invalid} unusable, {stale} outside the lookback window)",
            incidents.len()
        );
    }

    Ok(incidents)
}

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS`, or `YYYY-MM-DD` (midnight UTC).
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
