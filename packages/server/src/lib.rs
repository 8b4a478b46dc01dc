#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for safest-path routing.
//!
//! Serves the safest-path and hotspot endpoints under `/api`. Incidents come
//! from a JSON file when `INCIDENTS_JSON` is set and from the Postgres
//! store (`DATABASE_URL`) otherwise; routes come from the provider selected
//! by `ROUTING_PROVIDER`.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::error::{InternalError, QueryPayloadError};
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, middleware, web};
use saferoute_database::DatabaseIncidentSource;
use saferoute_planner::{IncidentSource, JsonIncidentSource, SafestPathPlanner, SafetyTuning};
use saferoute_routing::RouteProviderClient;
use saferoute_server_models::ApiError;

/// Environment variable naming a JSON incident file to use instead of the
/// database.
pub const INCIDENTS_JSON_ENV_VAR: &str = "INCIDENTS_JSON";

/// Shared application state.
pub struct AppState {
    /// Planner shared by every request.
    pub planner: SafestPathPlanner,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(query_error))
        .service(
            web::scope("/api")
                .route("/health", web::get().to(handlers::health))
                .route("/safest-path", web::get().to(handlers::safest_path))
                .route("/hotspots", web::get().to(handlers::hotspots)),
        );
}

/// Rejects malformed query strings with a JSON 400 body.
fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let body = ApiError::new(format!("Invalid query: {err}"));
    InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
}

/// Picks the incident source from the environment.
///
/// # Errors
///
/// Returns an error if the database connection fails.
pub async fn incident_source_from_env() -> Result<Arc<dyn IncidentSource>, Box<dyn std::error::Error>>
{
    if let Ok(path) = std::env::var(INCIDENTS_JSON_ENV_VAR) {
        log::info!("Reading incidents from {path}");
        return Ok(Arc::new(JsonIncidentSource::new(path)));
    }

    log::info!("Connecting to incident database...");
    Ok(Arc::new(DatabaseIncidentSource::from_env().await?))
}

/// Builds the planner from environment configuration.
///
/// # Errors
///
/// Returns an error if the tuning file, provider configuration, or
/// incident source is invalid.
pub async fn planner_from_env() -> Result<SafestPathPlanner, Box<dyn std::error::Error>> {
    let tuning = SafetyTuning::from_env()?;
    let provider = RouteProviderClient::from_env()?;
    log::info!("Using routing provider {}", provider.config().name);

    let incidents = incident_source_from_env().await?;

    Ok(SafestPathPlanner::new(Arc::new(provider), incidents, tuning))
}

/// Starts the safest-path API server.
///
/// Builds the planner from the environment and serves on `BIND_ADDR`
/// (default `127.0.0.1`) and `PORT` (default 8080). The caller provides
/// the async runtime (e.g. via `#[actix_web::main]`) and initializes
/// logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if configuration is invalid or the
/// HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    let planner = planner_from_env()
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to configure planner: {e}")))?;

    let state = web::Data::new(AppState { planner });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
