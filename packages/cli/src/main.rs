#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for safest-path routing.
//!
//! Computes a single safest path or lists the current hotspots and prints
//! the result as JSON. Incidents are read from `--incidents FILE` when
//! given and from the database (`DATABASE_URL`) otherwise.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use saferoute_crime_models::Point;
use saferoute_database::DatabaseIncidentSource;
use saferoute_planner::{
    DEFAULT_LOOKBACK_DAYS, IncidentSource, JsonIncidentSource, PlanningStrategy,
    SafestPathPlanner, SafetyTuning,
};
use saferoute_routing::RouteProviderClient;
use saferoute_routing::service_registry::all_providers;
use saferoute_spatial::exclusion::regions_to_feature_collection;

#[derive(Parser)]
#[command(name = "saferoute", about = "Crime-aware safest-path routing")]
struct Cli {
    /// Tuning TOML file (overrides `SAFEROUTE_TUNING`)
    #[arg(long, global = true)]
    tuning: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the safest path between two points
    Route {
        /// Origin as `LAT,LNG`
        #[arg(long, value_parser = parse_point)]
        start: Point,
        /// Destination as `LAT,LNG`
        #[arg(long, value_parser = parse_point)]
        end: Point,
        /// Incident lookback window in days
        #[arg(long, default_value_t = DEFAULT_LOOKBACK_DAYS)]
        lookback_days: u32,
        /// JSON incident file to use instead of the database
        #[arg(long)]
        incidents: Option<PathBuf>,
        /// `provider` or `grid`
        #[arg(long, default_value = "provider")]
        strategy: PlanningStrategy,
    },
    /// Print the current exclusion regions as `GeoJSON`
    Hotspots {
        /// Incident lookback window in days
        #[arg(long, default_value_t = DEFAULT_LOOKBACK_DAYS)]
        lookback_days: u32,
        /// JSON incident file to use instead of the database
        #[arg(long)]
        incidents: Option<PathBuf>,
    },
    /// List the registered routing providers
    Providers,
}

/// Parses `LAT,LNG` into a validated [`Point`].
fn parse_point(value: &str) -> Result<Point, String> {
    let (lat, lng) = value
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LNG, got `{value}`"))?;
    let latitude: f64 = lat
        .trim()
        .parse()
        .map_err(|e| format!("invalid latitude `{lat}`: {e}"))?;
    let longitude: f64 = lng
        .trim()
        .parse()
        .map_err(|e| format!("invalid longitude `{lng}`: {e}"))?;

    let point = Point::new(latitude, longitude);
    point.validate().map_err(|e| e.to_string())?;
    Ok(point)
}

async fn incident_source(
    incidents: Option<PathBuf>,
) -> Result<Arc<dyn IncidentSource>, Box<dyn std::error::Error>> {
    if let Some(path) = incidents {
        return Ok(Arc::new(JsonIncidentSource::new(path)));
    }
    log::info!("Connecting to incident database...");
    Ok(Arc::new(DatabaseIncidentSource::from_env().await?))
}

async fn planner(
    tuning: SafetyTuning,
    incidents: Option<PathBuf>,
) -> Result<SafestPathPlanner, Box<dyn std::error::Error>> {
    let provider = RouteProviderClient::from_env()?;
    let source = incident_source(incidents).await?;
    Ok(SafestPathPlanner::new(Arc::new(provider), source, tuning))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let tuning = match &cli.tuning {
        Some(path) => SafetyTuning::load(path)?,
        None => SafetyTuning::from_env()?,
    };

    match cli.command {
        Commands::Route {
            start,
            end,
            lookback_days,
            incidents,
            strategy,
        } => {
            let planner = planner(tuning, incidents).await?;
            let path = planner
                .compute_with_strategy(start, end, lookback_days, strategy)
                .await?;
            println!("{}", serde_json::to_string_pretty(&path)?);
        }
        Commands::Hotspots {
            lookback_days,
            incidents,
        } => {
            let planner = planner(tuning, incidents).await?;
            let regions = planner.hotspots(lookback_days).await?;
            log::info!("{} exclusion region(s)", regions.len());
            println!(
                "{}",
                serde_json::to_string_pretty(&regions_to_feature_collection(&regions))?
            );
        }
        Commands::Providers => {
            println!("{:<28} {:<24} PROFILE", "ID", "NAME");
            println!("{}", "-".repeat(70));
            for provider in all_providers() {
                println!(
                    "{:<28} {:<24} {}",
                    provider.id, provider.name, provider.profile
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn parses_lat_lng_pairs() {
        assert_eq!(parse_point("33.6,73.0").unwrap(), Point::new(33.6, 73.0));
        assert_eq!(parse_point(" 33.6 , 73.0 ").unwrap(), Point::new(33.6, 73.0));
    }

    #[test]
    fn rejects_malformed_points() {
        assert!(parse_point("33.6").is_err());
        assert!(parse_point("north,73.0").is_err());
        assert!(parse_point("95.0,73.0").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn route_arguments() {
        let cli = Cli::try_parse_from([
            "saferoute",
            "route",
            "--start",
            "33.6,73.0",
            "--end",
            "33.62,73.02",
            "--strategy",
            "grid",
            "--incidents",
            "incidents.json",
        ])
        .unwrap();

        match cli.command {
            Commands::Route {
                start,
                end,
                lookback_days,
                incidents,
                strategy,
            } => {
                assert_eq!(start, Point::new(33.6, 73.0));
                assert_eq!(end, Point::new(33.62, 73.02));
                assert_eq!(lookback_days, DEFAULT_LOOKBACK_DAYS);
                assert_eq!(incidents, Some(PathBuf::from("incidents.json")));
                assert_eq!(strategy, PlanningStrategy::Grid);
            }
            _ => panic!("expected route command"),
        }
    }
}
