#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Relational incident store.
//!
//! Reads recent incidents from a Postgres `crime_incidents` table with one
//! filtered `query_raw_params()` call per request and exposes them to the
//! planner through [`DatabaseIncidentSource`].

pub mod db;
pub mod queries;
pub mod source;

pub use source::DatabaseIncidentSource;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
