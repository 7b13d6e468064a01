//! services/planner/src/adapters/google_maps.rs
//!
//! This module contains the adapter for the Google Maps Directions and Places
//! web services. It implements the `DirectionsService` port from the `core` crate.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};
use trip_planner_core::domain::{Coordinate, PlaceCandidate, PlaceKind, RouteStep, RouteSummary};
use trip_planner_core::ports::{DirectionsService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct GoogleMapsAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    language: String,
    places_limit: usize,
}

impl GoogleMapsAdapter {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        language: impl Into<String>,
        places_limit: usize,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            language: language.into(),
            places_limit,
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> PortResult<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Network(format!(
                "maps provider responded with {}",
                response.status()
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Serialization(e.to_string()))
    }
}

fn latlng_param(c: Coordinate) -> String {
    format!("{},{}", c.latitude, c.longitude)
}

// `ZERO_RESULTS` is a successful empty answer; every other non-OK status is a failure.
fn check_status(status: &str, error_message: Option<String>) -> PortResult<()> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "REQUEST_DENIED" => {
            error!("Maps request denied: {:?}", error_message);
            Err(PortError::Unauthorized)
        }
        other => Err(PortError::Unexpected(
            error_message.unwrap_or_else(|| format!("maps provider returned status {}", other)),
        )),
    }
}

//=========================================================================================
// Provider Response Shapes
//=========================================================================================

#[derive(Deserialize)]
struct TextField {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct DirectionsResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<RouteRecord>,
}

#[derive(Deserialize)]
struct RouteRecord {
    #[serde(default)]
    legs: Vec<LegRecord>,
    overview_polyline: Option<PolylineRecord>,
}

#[derive(Deserialize)]
struct LegRecord {
    distance: Option<TextField>,
    duration: Option<TextField>,
    #[serde(default)]
    steps: Vec<RouteStep>,
}

#[derive(Deserialize)]
struct PolylineRecord {
    points: String,
}

#[derive(Deserialize)]
struct PlacesResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<PlaceCandidate>,
}

impl RouteRecord {
    fn to_domain(self) -> RouteSummary {
        let leg = self.legs.into_iter().next();
        let (distance, duration, steps) = match leg {
            Some(leg) => (
                leg.distance.map(|d| d.text),
                leg.duration.map(|d| d.text),
                leg.steps,
            ),
            None => (None, None, Vec::new()),
        };
        RouteSummary {
            distance,
            duration,
            steps,
            polyline: self.overview_polyline.map(|p| p.points),
        }
    }
}

//=========================================================================================
// `DirectionsService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DirectionsService for GoogleMapsAdapter {
    async fn get_directions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> PortResult<RouteSummary> {
        let response: DirectionsResponse = self
            .get_json(
                "/maps/api/directions/json",
                &[
                    ("origin", latlng_param(origin)),
                    ("destination", latlng_param(destination)),
                    ("language", self.language.clone()),
                ],
            )
            .await?;
        check_status(&response.status, response.error_message)?;

        let route = response
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| PortError::NotFound("No route found".to_string()))?;
        debug!("Fetched route with {} legs", route.legs.len());
        Ok(route.to_domain())
    }

    async fn nearby_places(
        &self,
        location: Coordinate,
        kind: PlaceKind,
        radius_meters: u32,
    ) -> PortResult<Vec<PlaceCandidate>> {
        let response: PlacesResponse = self
            .get_json(
                "/maps/api/place/nearbysearch/json",
                &[
                    ("location", latlng_param(location)),
                    ("radius", radius_meters.to_string()),
                    ("type", kind.as_provider_type().to_string()),
                ],
            )
            .await?;
        check_status(&response.status, response.error_message)?;

        let mut places = response.results;
        places.truncate(self.places_limit);
        Ok(places)
    }
}
