//! Incident queries.
//!
//! Expects a `crime_incidents` table with at least these columns:
//!
//! | column        | type               |
//! |---------------|--------------------|
//! | `category`    | `TEXT NULL`        |
//! | `latitude`    | `DOUBLE PRECISION` |
//! | `longitude`   | `DOUBLE PRECISION` |
//! | `occurred_at` | `TIMESTAMP`        |
//!
//! Coordinates may be NULL; such rows are skipped.

use chrono::{DateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use saferoute_crime_models::{Incident, RawIncident};
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

const RECENT_INCIDENTS_SQL: &str = "SELECT category, latitude, longitude
     FROM crime_incidents
     WHERE occurred_at >= $1
       AND latitude IS NOT NULL
       AND longitude IS NOT NULL";

/// The instant `lookback_days` days before now.
///
/// # Errors
///
/// Returns [`DbError::Conversion`] if the window underflows the calendar.
pub fn lookback_cutoff(lookback_days: u32) -> Result<DateTime<Utc>, DbError> {
    chrono::Duration::try_days(i64::from(lookback_days))
        .and_then(|window| Utc::now().checked_sub_signed(window))
        .ok_or_else(|| DbError::Conversion {
            message: format!("Lookback window of {lookback_days} days is out of range"),
        })
}

/// Fetches every incident that occurred at or after `since`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn recent_incidents(
    db: &dyn Database,
    since: DateTime<Utc>,
) -> Result<Vec<Incident>, DbError> {
    let rows = db
        .query_raw_params(
            RECENT_INCIDENTS_SQL,
            &[DatabaseValue::DateTime(since.naive_utc())],
        )
        .await?;

    let mut incidents = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;

    for row in &rows {
        let category: Option<String> = row.to_value("category").unwrap_or(None);
        let latitude: Option<f64> = row.to_value("latitude").unwrap_or(None);
        let longitude: Option<f64> = row.to_value("longitude").unwrap_or(None);

        match incident_from_columns(category, latitude, longitude) {
            Some(incident) => incidents.push(incident),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        log::debug!("Skipped {skipped} incident row(s) without usable coordinates");
    }

    Ok(incidents)
}

/// Normalizes one row's columns, or `None` if the coordinates are missing
/// or out of range.
#[must_use]
pub fn incident_from_columns(
    category: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Option<Incident> {
    Incident::try_from(RawIncident::flat(category, latitude, longitude)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_row_becomes_incident() {
        let incident =
            incident_from_columns(Some("Robbery".to_string()), Some(33.6), Some(73.0)).unwrap();
        assert_eq!(incident, Incident::new(33.6, 73.0, "Robbery"));
    }

    #[test]
    fn null_coordinates_are_skipped() {
        assert!(incident_from_columns(Some("theft".to_string()), None, Some(73.0)).is_none());
        assert!(incident_from_columns(Some("theft".to_string()), Some(33.6), None).is_none());
    }

    #[test]
    fn out_of_range_coordinates_are_skipped() {
        assert!(incident_from_columns(None, Some(120.0), Some(73.0)).is_none());
    }

    #[test]
    fn null_category_is_kept_with_empty_label() {
        let incident = incident_from_columns(None, Some(33.6), Some(73.0)).unwrap();
        assert!(incident.category.is_empty());
    }

    #[test]
    fn cutoff_is_in_the_past() {
        let cutoff = lookback_cutoff(30).unwrap();
        let age = Utc::now() - cutoff;
        assert!(age.num_days() >= 29 && age.num_days() <= 30);
    }

    #[test]
    fn query_filters_on_occurrence_time() {
        assert!(RECENT_INCIDENTS_SQL.contains("occurred_at >= $1"));
        assert!(RECENT_INCIDENTS_SQL.contains("FROM crime_incidents"));
    }
}
