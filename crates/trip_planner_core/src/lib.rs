pub mod domain;
pub mod polyline;
pub mod ports;
pub mod route;
pub mod trip_store;

pub use domain::{
    AuthSession, BudgetLevel, Coordinate, LatLng, PlaceCandidate, PlaceKind, PlaceRef,
    PreferencesUpdate, RouteStep, RouteSummary, TransportMode, Travelers, Trip, TripId,
    TripReview, UserPreferences,
};
pub use ports::{
    AuthService, DirectionsService, FavoritesStream, KeyValueStorage, LocalTripStore, PortError,
    PortResult, RemoteFavoritesSync,
};
pub use route::{distance_km, estimate_travel, TravelEstimate};
pub use trip_store::{TripStore, FAVORITES_KEY, TRIPS_KEY};
