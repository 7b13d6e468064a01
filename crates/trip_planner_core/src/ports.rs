//! crates/trip_planner_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific storage backends, remote stores and map providers.

use async_trait::async_trait;
use futures::Stream;
use std::collections::HashSet;
use std::pin::Pin;
use tracing::warn;

use crate::domain::{AuthSession, Coordinate, PlaceCandidate, PlaceKind, RouteSummary, Trip, TripId};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., file system, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Successive snapshots of a user's remote favorites. The first item is the
/// current value; each later item follows a remote change.
pub type FavoritesStream = Pin<Box<dyn Stream<Item = PortResult<Vec<Trip>>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Device-local durable string storage.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get_item(&self, key: &str) -> PortResult<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> PortResult<()>;

    async fn remove_item(&self, key: &str) -> PortResult<()>;
}

/// Persisted trip list plus the separately persisted favorites list.
///
/// Each operation is atomic per key only. The favorites list is a copy, so
/// every mutation that touches a trip must keep both lists consistent.
#[async_trait]
pub trait LocalTripStore: Send + Sync {
    // --- Trips ---
    /// Appends a trip. Never overwrites existing entries.
    async fn save(&self, trip: &Trip) -> PortResult<()>;

    /// Reads the trip list, reporting storage failures.
    async fn try_list(&self) -> PortResult<Vec<Trip>>;

    /// Reads the trip list; failures are logged and read as empty.
    async fn list(&self) -> Vec<Trip> {
        match self.try_list().await {
            Ok(trips) => trips,
            Err(e) => {
                warn!("Failed to read saved trips: {}", e);
                Vec::new()
            }
        }
    }

    /// Replaces the stored trip with the same id.
    async fn update(&self, trip: &Trip) -> PortResult<()>;

    /// Removes a trip from both the trip list and the favorites list.
    async fn remove(&self, trip_id: &str) -> PortResult<()>;

    // --- Favorites ---
    async fn save_favorites(&self, favorites: &[Trip]) -> PortResult<()>;

    async fn list_favorites(&self) -> Vec<Trip>;

    /// Rewrites the stored favorite flag of every trip to match `favorite_ids`.
    async fn sync_favorite_flags(&self, favorite_ids: &HashSet<TripId>) -> PortResult<()>;
}

/// Per-user remote favorites with live change notification.
#[async_trait]
pub trait RemoteFavoritesSync: Send + Sync {
    /// Opens a live view of the user's favorites. Dropping the stream releases
    /// the subscription.
    async fn subscribe(&self, user_id: &str) -> PortResult<FavoritesStream>;

    /// Replaces the user's remote favorites wholesale.
    async fn push(&self, user_id: &str, favorites: &[Trip]) -> PortResult<()>;
}

#[async_trait]
pub trait DirectionsService: Send + Sync {
    /// Fetches the first route between two points.
    async fn get_directions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> PortResult<RouteSummary>;

    async fn nearby_places(
        &self,
        location: Coordinate,
        kind: PlaceKind,
        radius_meters: u32,
    ) -> PortResult<Vec<PlaceCandidate>>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<AuthSession>;

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthSession>;

    /// Ends the session with the provider.
    async fn sign_out(&self, session: &AuthSession) -> PortResult<()>;

    /// Exchanges the refresh token for a new id token.
    async fn refresh(&self, session: &AuthSession) -> PortResult<AuthSession>;

    /// Sends a password reset email.
    async fn reset_password(&self, email: &str) -> PortResult<()>;
}
