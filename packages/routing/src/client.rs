//! The routing provider client and its strategy chain.

use saferoute_crime_models::Point;
use saferoute_routing_models::{Route, RouteRequest, RouteSource, RouteStrategy};
use saferoute_spatial::ExclusionRegion;
use saferoute_spatial::exclusion::to_multi_polygon;
use serde::Serialize;

use crate::parse::{ParsedRoute, parse_feature_collection, parse_flat_routes};
use crate::service_registry::ProviderConfig;
use crate::{RouteProvider, RoutingError, retry};

/// JSON body shared by both structured directions endpoints.
#[derive(Debug, Serialize)]
struct DirectionsBody {
    coordinates: [[f64; 2]; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<DirectionsOptions>,
}

#[derive(Debug, Serialize)]
struct DirectionsOptions {
    avoid_polygons: geojson::Geometry,
}

impl DirectionsBody {
    fn new(start: Point, end: Point, exclusions: &[ExclusionRegion]) -> Self {
        let options = (!exclusions.is_empty()).then(|| DirectionsOptions {
            avoid_polygons: geojson::Geometry::new(geojson::Value::from(&to_multi_polygon(
                exclusions,
            ))),
        });
        Self {
            coordinates: [start.lng_lat(), end.lng_lat()],
            options,
        }
    }
}

/// Client for an OpenRouteService-compatible directions API.
///
/// Owns its configuration and HTTP client; construct once and share it
/// (typically behind an `Arc<dyn RouteProvider>`).
pub struct RouteProviderClient {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl RouteProviderClient {
    /// Creates a client for the given provider configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Http`] if the HTTP client cannot be built.
    pub fn new(config: ProviderConfig) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { config, client })
    }

    /// Creates a client from the environment (see
    /// [`ProviderConfig::from_env`]).
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if the provider is unknown or the HTTP client
    /// cannot be built.
    pub fn from_env() -> Result<Self, RoutingError> {
        Self::new(ProviderConfig::from_env()?)
    }

    /// The provider configuration.
    #[must_use]
    pub const fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The full strategy chain in attempt order: the configured networked
    /// strategies followed by the straight-line fallback.
    #[must_use]
    pub fn strategy_chain(&self) -> Vec<RouteStrategy> {
        let mut chain: Vec<RouteStrategy> = self
            .config
            .strategies
            .iter()
            .copied()
            .filter(|s| s.is_networked())
            .collect();
        chain.push(RouteStrategy::StraightLine);
        chain
    }

    /// Whether `strategy` can serve `request` at all.
    ///
    /// The query-string form cannot carry avoid polygons, and the straight
    /// line is not a road-following result.
    #[must_use]
    pub const fn applicable(strategy: RouteStrategy, request: &RouteRequest<'_>) -> bool {
        match strategy {
            RouteStrategy::DirectionsQuery => request.exclusions.is_empty(),
            RouteStrategy::StraightLine => !request.require_road,
            RouteStrategy::DirectionsGeojson | RouteStrategy::DirectionsJson => true,
        }
    }

    /// Runs a single strategy, including its retries.
    ///
    /// # Errors
    ///
    /// Returns the strategy's failure (rejection, exhausted retries, or an
    /// unusable response body).
    pub async fn attempt(
        &self,
        strategy: RouteStrategy,
        request: &RouteRequest<'_>,
    ) -> Result<Route, RoutingError> {
        let exclusions = self.capped(request.exclusions);

        let parsed = match strategy {
            RouteStrategy::DirectionsGeojson => {
                let url = self.directions_url(Some("geojson"));
                let body = DirectionsBody::new(request.start, request.end, exclusions);
                let value = retry::send_json(|| self.post(&url, &body), &self.config.retry).await?;
                parse_feature_collection(&value)?
            }
            RouteStrategy::DirectionsJson => {
                let url = self.directions_url(Some("json"));
                let body = DirectionsBody::new(request.start, request.end, exclusions);
                let value = retry::send_json(|| self.post(&url, &body), &self.config.retry).await?;
                parse_flat_routes(&value)?
            }
            RouteStrategy::DirectionsQuery => {
                let url = self.directions_url(None);
                let query = self.query_params(request.start, request.end);
                let value = retry::send_json(
                    || self.client.get(&url).query(&query),
                    &self.config.retry,
                )
                .await?;
                parse_feature_collection(&value)?
            }
            RouteStrategy::StraightLine => {
                return Ok(Route::straight_line(request.start, request.end));
            }
        };

        Ok(into_route(parsed, strategy))
    }

    /// [`Self::attempt`], abandoned with [`RoutingError::DeadlineReached`]
    /// once the request deadline passes.
    async fn attempt_within_deadline(
        &self,
        strategy: RouteStrategy,
        request: &RouteRequest<'_>,
    ) -> Result<Route, RoutingError> {
        match request.deadline {
            Some(deadline) if strategy.is_networked() => {
                tokio::time::timeout_at(deadline.into(), self.attempt(strategy, request))
                    .await
                    .unwrap_or(Err(RoutingError::DeadlineReached))
            }
            _ => self.attempt(strategy, request).await,
        }
    }

    fn capped<'a>(&self, exclusions: &'a [ExclusionRegion]) -> &'a [ExclusionRegion] {
        let max = self.config.max_exclusion_regions;
        if exclusions.len() > max {
            log::debug!(
                "Passing the top {max} of {} exclusion regions to '{}'",
                exclusions.len(),
                self.config.id
            );
        }
        saferoute_spatial::limit_regions(exclusions, max)
    }

    /// `{base}/v2/directions/{profile}[/{format}]`
    fn directions_url(&self, format: Option<&str>) -> String {
        let base = format!(
            "{}/v2/directions/{}",
            self.config.base(),
            self.config.profile
        );
        match format {
            Some(format) => format!("{base}/{format}"),
            None => base,
        }
    }

    fn post(&self, url: &str, body: &DirectionsBody) -> reqwest::RequestBuilder {
        let builder = self.client.post(url).json(body);
        match &self.config.api_key {
            Some(key) => builder.header(reqwest::header::AUTHORIZATION, key),
            None => builder,
        }
    }

    fn query_params(&self, start: Point, end: Point) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("start", format!("{},{}", start.longitude, start.latitude)),
            ("end", format!("{},{}", end.longitude, end.latitude)),
        ];
        if let Some(key) = &self.config.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }
}

fn into_route(parsed: ParsedRoute, strategy: RouteStrategy) -> Route {
    Route {
        points: parsed.points,
        distance_m: parsed.distance_m,
        duration_s: parsed.duration_s,
        source: RouteSource::Provider { strategy },
    }
}

#[async_trait::async_trait]
impl RouteProvider for RouteProviderClient {
    async fn get_route(&self, request: &RouteRequest<'_>) -> Result<Route, RoutingError> {
        request.start.validate()?;
        request.end.validate()?;

        for strategy in self.strategy_chain() {
            if !Self::applicable(strategy, request) {
                log::debug!("Skipping routing strategy {strategy} for this request");
                continue;
            }

            if strategy.is_networked() && request.is_past_deadline() {
                log::warn!("Skipping routing strategy {strategy}: request deadline reached");
                continue;
            }

            match self.attempt_within_deadline(strategy, request).await {
                Ok(route) => {
                    log::debug!(
                        "Routing strategy {strategy} produced {} point(s), {:.0} m",
                        route.points.len(),
                        route.distance_m
                    );
                    if strategy == RouteStrategy::StraightLine {
                        log::warn!(
                            "All networked routing strategies failed for {} -> {}; \
                             returning straight line",
                            request.start,
                            request.end
                        );
                    }
                    return Ok(route);
                }
                Err(e) => {
                    log::warn!(
                        "Routing strategy {strategy} failed via '{}' ({}): {e}",
                        self.config.id,
                        self.config.base()
                    );
                }
            }
        }

        log::error!(
            "No route found for {} -> {} (require_road={})",
            request.start,
            request.end,
            request.require_road
        );
        Err(RoutingError::NoRouteFound)
    }
}

#[cfg(test)]
mod tests {
    use saferoute_crime_models::{Incident, SeverityWeights};
    use saferoute_spatial::{ClusterTuning, RegionTuning, build_regions, cluster};

    use std::time::{Duration, Instant};

    use super::*;
    use crate::test_support::{ScriptedServer, config_for, silent_server};

    const FEATURE_COLLECTION: &str = r#"{"type":"FeatureCollection","features":[{"geometry":{"type":"LineString","coordinates":[[73.0,33.6],[73.01,33.61],[73.02,33.62]]},"properties":{"summary":{"distance":3100.0,"duration":240.0}}}]}"#;
    const FLAT_ROUTES: &str =
        r#"{"routes":[{"geometry":[[73.0,33.6],[73.02,33.62]],"summary":{"distance":2900.0,"duration":200.0}}]}"#;

    fn unreachable_client() -> RouteProviderClient {
        RouteProviderClient::new(config_for("http://127.0.0.1:9", 2_000, 1)).unwrap()
    }

    fn scripted_client(server: &ScriptedServer) -> RouteProviderClient {
        RouteProviderClient::new(config_for(&server.base_url, 2_000, 3)).unwrap()
    }

    fn direct() -> RouteRequest<'static> {
        RouteRequest::direct(Point::new(33.6, 73.0), Point::new(33.62, 73.02))
    }

    fn regions() -> Vec<ExclusionRegion> {
        let incidents: Vec<Incident> = (0..5)
            .map(|_| Incident::new(33.61, 73.01, "robbery"))
            .collect();
        build_regions(
            &cluster(&incidents, &SeverityWeights::default(), &ClusterTuning::default()),
            &RegionTuning::default(),
        )
    }

    #[test]
    fn body_omits_options_without_exclusions() {
        let body = DirectionsBody::new(Point::new(33.6, 73.0), Point::new(33.62, 73.02), &[]);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["coordinates"][0][0], 73.0);
        assert_eq!(json["coordinates"][0][1], 33.6);
        assert!(json.get("options").is_none());
    }

    #[test]
    fn body_carries_avoid_multipolygon() {
        let regions = regions();
        let body = DirectionsBody::new(Point::new(33.6, 73.0), Point::new(33.62, 73.02), &regions);
        let json = serde_json::to_value(&body).unwrap();
        let avoid = &json["options"]["avoid_polygons"];
        assert_eq!(avoid["type"], "MultiPolygon");
        assert_eq!(avoid["coordinates"].as_array().unwrap().len(), regions.len());
        assert_eq!(avoid["coordinates"][0][0].as_array().unwrap().len(), 17);
    }

    #[test]
    fn strategy_chain_ends_with_straight_line() {
        let chain = unreachable_client().strategy_chain();
        assert_eq!(chain.first(), Some(&RouteStrategy::DirectionsGeojson));
        assert_eq!(chain.last(), Some(&RouteStrategy::StraightLine));
        assert_eq!(
            chain
                .iter()
                .filter(|s| **s == RouteStrategy::StraightLine)
                .count(),
            1
        );
    }

    #[test]
    fn query_strategy_is_skipped_with_exclusions() {
        let regions = regions();
        let start = Point::new(33.6, 73.0);
        let end = Point::new(33.62, 73.02);
        assert!(RouteProviderClient::applicable(
            RouteStrategy::DirectionsQuery,
            &RouteRequest::direct(start, end)
        ));
        assert!(!RouteProviderClient::applicable(
            RouteStrategy::DirectionsQuery,
            &RouteRequest::avoiding(start, end, &regions)
        ));
    }

    #[test]
    fn straight_line_is_skipped_when_road_required() {
        let start = Point::new(33.6, 73.0);
        let end = Point::new(33.62, 73.02);
        assert!(RouteProviderClient::applicable(
            RouteStrategy::StraightLine,
            &RouteRequest::direct(start, end)
        ));
        assert!(!RouteProviderClient::applicable(
            RouteStrategy::StraightLine,
            &RouteRequest::avoiding(start, end, &[])
        ));
    }

    #[test]
    fn query_params_put_longitude_first() {
        let client = unreachable_client();
        let params = client.query_params(Point::new(33.6, 73.0), Point::new(33.62, 73.02));
        assert_eq!(params[0], ("start", "73,33.6".to_string()));
        assert_eq!(params[1], ("end", "73.02,33.62".to_string()));
        assert_eq!(params[2].0, "api_key");
    }

    #[test]
    fn directions_urls() {
        let client = unreachable_client();
        assert_eq!(
            client.directions_url(Some("geojson")),
            "http://127.0.0.1:9/v2/directions/driving-car/geojson"
        );
        assert_eq!(
            client.directions_url(None),
            "http://127.0.0.1:9/v2/directions/driving-car"
        );
    }

    #[tokio::test]
    async fn all_strategies_failing_yields_straight_line() {
        let client = unreachable_client();
        let start = Point::new(33.6, 73.0);
        let end = Point::new(33.62, 73.02);
        let route = client
            .get_route(&RouteRequest::direct(start, end))
            .await
            .unwrap();
        assert_eq!(route.points, vec![start, end]);
        assert_eq!(route.source, RouteSource::StraightLine);
        assert!(route.duration_s.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn road_required_and_unreachable_is_no_route() {
        let client = unreachable_client();
        let regions = regions();
        let result = client
            .get_route(&RouteRequest::avoiding(
                Point::new(33.6, 73.0),
                Point::new(33.62, 73.02),
                &regions,
            ))
            .await;
        assert!(matches!(result, Err(RoutingError::NoRouteFound)));
    }

    #[tokio::test]
    async fn invalid_coordinates_fail_fast() {
        let client = unreachable_client();
        let result = client
            .get_route(&RouteRequest::direct(
                Point::new(120.0, 73.0),
                Point::new(33.62, 73.02),
            ))
            .await;
        assert!(matches!(result, Err(RoutingError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn rejected_shape_moves_on_to_json_endpoint() {
        let server = ScriptedServer::start(vec![
            (400, r#"{"error":{"message":"unsupported body"}}"#),
            (503, "{}"),
            (200, FLAT_ROUTES),
        ]);
        let route = scripted_client(&server).get_route(&direct()).await.unwrap();

        assert_eq!(
            route.source,
            RouteSource::Provider {
                strategy: RouteStrategy::DirectionsJson
            }
        );
        assert_eq!(route.points.len(), 2);
        assert!((route.duration_s - 200.0).abs() < f64::EPSILON);

        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].starts_with("POST /v2/directions/driving-car/geojson "));
        assert!(requests[1].starts_with("POST /v2/directions/driving-car/json "));
        assert!(requests[2].starts_with("POST /v2/directions/driving-car/json "));
    }

    #[tokio::test]
    async fn rate_limit_is_retried_on_the_same_strategy() {
        let server = ScriptedServer::start(vec![(429, ""), (200, FEATURE_COLLECTION)]);
        let route = scripted_client(&server).get_route(&direct()).await.unwrap();

        assert_eq!(
            route.source,
            RouteSource::Provider {
                strategy: RouteStrategy::DirectionsGeojson
            }
        );
        assert_eq!(route.points.len(), 3);
        assert!((route.distance_m - 3100.0).abs() < f64::EPSILON);
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn malformed_body_is_retried() {
        let server =
            ScriptedServer::start(vec![(200, "<html>gateway hiccup"), (200, FEATURE_COLLECTION)]);
        let route = scripted_client(&server).get_route(&direct()).await.unwrap();

        assert_eq!(
            route.source,
            RouteSource::Provider {
                strategy: RouteStrategy::DirectionsGeojson
            }
        );
        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.contains("/geojson ")));
    }

    #[tokio::test]
    async fn error_body_moves_on_to_next_strategy() {
        let server = ScriptedServer::start(vec![
            (200, r#"{"error":{"code":2004,"message":"route too long"}}"#),
            (200, FLAT_ROUTES),
        ]);
        let route = scripted_client(&server).get_route(&direct()).await.unwrap();

        assert_eq!(
            route.source,
            RouteSource::Provider {
                strategy: RouteStrategy::DirectionsJson
            }
        );
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn hanging_provider_yields_straight_line_by_the_deadline() {
        let client = RouteProviderClient::new(config_for(&silent_server(), 150, 3)).unwrap();
        let started = Instant::now();
        let request = direct().with_deadline(started + Duration::from_millis(300));

        let route = client.get_route(&request).await.unwrap();

        assert_eq!(route.source, RouteSource::StraightLine);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn hanging_provider_without_road_fallback_fails_by_the_deadline() {
        let client = RouteProviderClient::new(config_for(&silent_server(), 150, 3)).unwrap();
        let regions = regions();
        let started = Instant::now();
        let request = RouteRequest::avoiding(Point::new(33.6, 73.0), Point::new(33.62, 73.02), &regions)
            .with_deadline(started + Duration::from_millis(300));

        let result = client.get_route(&request).await;

        assert!(matches!(result, Err(RoutingError::NoRouteFound)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn expired_deadline_skips_the_network() {
        let server = ScriptedServer::start(vec![(200, FEATURE_COLLECTION)]);
        let request = direct().with_deadline(Instant::now());

        let route = scripted_client(&server).get_route(&request).await.unwrap();

        assert_eq!(route.source, RouteSource::StraightLine);
        assert!(server.requests().is_empty());
    }
}
