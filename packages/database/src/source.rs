//! [`IncidentSource`] backed by the relational store.

use async_trait::async_trait;
use saferoute_crime_models::Incident;
use saferoute_planner::{IncidentSource, IncidentSourceError};
use switchy_database::Database;

use crate::{DbError, queries};

impl From<DbError> for IncidentSourceError {
    fn from(err: DbError) -> Self {
        Self::Database {
            message: err.to_string(),
        }
    }
}

/// Reads incidents from the `crime_incidents` table.
pub struct DatabaseIncidentSource {
    db: Box<dyn Database>,
}

impl std::fmt::Debug for DatabaseIncidentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseIncidentSource").finish_non_exhaustive()
    }
}

impl DatabaseIncidentSource {
    #[must_use]
    pub fn new(db: Box<dyn Database>) -> Self {
        Self { db }
    }

    /// Connects using `DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::new(crate::db::connect_from_env().await?))
    }
}

#[async_trait]
impl IncidentSource for DatabaseIncidentSource {
    async fn fetch_incidents(
        &self,
        lookback_days: u32,
    ) -> Result<Vec<Incident>, IncidentSourceError> {
        let since = queries::lookback_cutoff(lookback_days)?;
        let incidents = queries::recent_incidents(self.db.as_ref(), since).await?;
        log::debug!(
            "Fetched {} incident(s) from the last {lookback_days} day(s)",
            incidents.len()
        );
        Ok(incidents)
    }
}
