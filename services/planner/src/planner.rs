//! services/planner/src/planner.rs
//!
//! Builds an unsaved itinerary from a trip request: the driving route between
//! the two places plus lodging and attractions around the destination.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument};
use trip_planner_core::domain::{
    Coordinate, PlaceKind, PlaceRef, TransportMode, Travelers, Trip,
};
use trip_planner_core::ports::DirectionsService;

use crate::error::AppError;

pub const LODGING_RADIUS_METERS: u32 = 1500;
pub const ATTRACTIONS_RADIUS_METERS: u32 = 2000;
pub const SUGGESTIONS_PER_KIND: usize = 5;

/// Everything the user picked before asking for a plan.
#[derive(Debug, Clone, Default)]
pub struct TripRequest {
    pub origin: PlaceRef,
    pub destination: PlaceRef,
    pub departure_date: Option<DateTime<Utc>>,
    pub return_date: Option<DateTime<Utc>>,
    pub travelers: Travelers,
    pub has_pets: bool,
    pub transport_mode: TransportMode,
}

/// The visible map area around a route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapRegion {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl MapRegion {
    /// Centers on the midpoint of the two ends with 1.5x their span.
    pub fn framing(a: Coordinate, b: Coordinate) -> Self {
        Self {
            latitude: (a.latitude + b.latitude) / 2.0,
            longitude: (a.longitude + b.longitude) / 2.0,
            latitude_delta: (a.latitude - b.latitude).abs() * 1.5,
            longitude_delta: (a.longitude - b.longitude).abs() * 1.5,
        }
    }
}

pub struct TripPlanner {
    directions: Arc<dyn DirectionsService>,
}

impl TripPlanner {
    pub fn new(directions: Arc<dyn DirectionsService>) -> Self {
        Self { directions }
    }

    /// Fetches the route and suggestions and assembles a trip ready for
    /// `TravelStateManager::add_trip`. Any provider failure fails the plan.
    #[instrument(skip(self, request), fields(destination = %request.destination.main_text()))]
    pub async fn plan(&self, request: TripRequest) -> Result<Trip, AppError> {
        if let (Some(departure), Some(ret)) = (request.departure_date, request.return_date) {
            if ret < departure {
                return Err(AppError::InvalidInput(
                    "the return date must not be before the departure date".to_string(),
                ));
            }
        }
        let origin = request.origin.coordinate().ok_or_else(|| {
            AppError::InvalidInput("the origin has no coordinates".to_string())
        })?;
        let destination = request.destination.coordinate().ok_or_else(|| {
            AppError::InvalidInput("the destination has no coordinates".to_string())
        })?;

        let route = self.directions.get_directions(origin, destination).await?;
        let mut lodging = self
            .directions
            .nearby_places(destination, PlaceKind::Lodging, LODGING_RADIUS_METERS)
            .await?;
        let mut attractions = self
            .directions
            .nearby_places(
                destination,
                PlaceKind::TouristAttraction,
                ATTRACTIONS_RADIUS_METERS,
            )
            .await?;
        lodging.truncate(SUGGESTIONS_PER_KIND);
        attractions.truncate(SUGGESTIONS_PER_KIND);

        info!(
            "Planned trip with {} lodging and {} attraction suggestions",
            lodging.len(),
            attractions.len()
        );

        Ok(Trip {
            origin: Some(request.origin),
            destination: Some(request.destination),
            departure_date: request.departure_date,
            return_date: request.return_date,
            travelers: request.travelers,
            has_pets: request.has_pets,
            transport_mode: request.transport_mode,
            route: Some(route),
            lodging,
            attractions,
            created_at: Some(Utc::now()),
            ..Default::default()
        })
    }
}
