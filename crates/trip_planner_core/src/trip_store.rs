//! crates/trip_planner_core/src/trip_store.rs
//!
//! The local trip store: trips and favorites persisted as two JSON arrays under
//! two fixed keys of a `KeyValueStorage`.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::domain::{Trip, TripId};
use crate::ports::{KeyValueStorage, LocalTripStore, PortError, PortResult};

pub const TRIPS_KEY: &str = "@trip_planner_savedTrips";
pub const FAVORITES_KEY: &str = "@trip_planner_favorites";

/// Every read-modify-write of the stored lists runs under `writes`, so a
/// concurrent writer never persists a list read before another write landed.
/// Clones share the lock.
#[derive(Clone)]
pub struct TripStore {
    storage: Arc<dyn KeyValueStorage>,
    writes: Arc<Mutex<()>>,
}

impl TripStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Reads a trip array. A storage failure is an error; a payload that is
    /// not an array reads as empty and malformed entries are skipped.
    async fn read_list(&self, key: &str) -> PortResult<Vec<Trip>> {
        let Some(raw) = self.storage.get_item(key).await? else {
            return Ok(Vec::new());
        };

        let entries = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => entries,
            Ok(Value::Null) => return Ok(Vec::new()),
            Ok(_) | Err(_) => {
                warn!("Stored value under {} is not a trip list; reading it as empty", key);
                return Ok(Vec::new());
            }
        };

        let trips = entries
            .into_iter()
            .enumerate()
            .filter_map(|(i, entry)| match serde_json::from_value::<Trip>(entry) {
                Ok(trip) => Some(trip),
                Err(e) => {
                    warn!("Skipping malformed entry {} under {}: {}", i, key, e);
                    None
                }
            })
            .collect();
        Ok(trips)
    }

    async fn write_list(&self, key: &str, trips: &[Trip]) -> PortResult<()> {
        let json =
            serde_json::to_string(trips).map_err(|e| PortError::Serialization(e.to_string()))?;
        self.storage.set_item(key, &json).await
    }
}

#[async_trait]
impl LocalTripStore for TripStore {
    async fn save(&self, trip: &Trip) -> PortResult<()> {
        let _guard = self.writes.lock().await;
        let mut trips = self.read_list(TRIPS_KEY).await?;
        trips.push(trip.clone());
        self.write_list(TRIPS_KEY, &trips).await.map_err(|e| {
            error!("Error saving trip {}: {}", trip.id, e);
            e
        })
    }

    async fn try_list(&self) -> PortResult<Vec<Trip>> {
        self.read_list(TRIPS_KEY).await
    }

    async fn update(&self, trip: &Trip) -> PortResult<()> {
        let _guard = self.writes.lock().await;
        let mut trips = self.read_list(TRIPS_KEY).await?;
        let slot = trips
            .iter_mut()
            .find(|t| t.id == trip.id)
            .ok_or_else(|| PortError::NotFound(format!("Trip {} not found", trip.id)))?;
        *slot = trip.clone();
        self.write_list(TRIPS_KEY, &trips).await
    }

    async fn remove(&self, trip_id: &str) -> PortResult<()> {
        let _guard = self.writes.lock().await;
        let trips = self.read_list(TRIPS_KEY).await?;
        if !trips.iter().any(|t| t.id == trip_id) {
            return Err(PortError::NotFound(format!("Trip {} not found", trip_id)));
        }

        let remaining: Vec<Trip> = trips.into_iter().filter(|t| t.id != trip_id).collect();
        self.write_list(TRIPS_KEY, &remaining).await.map_err(|e| {
            error!("Error removing trip {}: {}", trip_id, e);
            e
        })?;

        let favorites = self.read_list(FAVORITES_KEY).await?;
        if favorites.iter().any(|t| t.id == trip_id) {
            let favorites: Vec<Trip> = favorites.into_iter().filter(|t| t.id != trip_id).collect();
            self.write_list(FAVORITES_KEY, &favorites).await?;
        }
        debug!("Removed trip {}", trip_id);
        Ok(())
    }

    async fn save_favorites(&self, favorites: &[Trip]) -> PortResult<()> {
        let _guard = self.writes.lock().await;
        self.write_list(FAVORITES_KEY, favorites).await.map_err(|e| {
            error!("Error saving favorites: {}", e);
            e
        })
    }

    async fn list_favorites(&self) -> Vec<Trip> {
        match self.read_list(FAVORITES_KEY).await {
            Ok(favorites) => favorites,
            Err(e) => {
                warn!("Failed to read favorites: {}", e);
                Vec::new()
            }
        }
    }

    async fn sync_favorite_flags(&self, favorite_ids: &HashSet<TripId>) -> PortResult<()> {
        let _guard = self.writes.lock().await;
        let mut trips = self.read_list(TRIPS_KEY).await?;
        let mut changed = false;
        for trip in trips.iter_mut() {
            let favorite = favorite_ids.contains(&trip.id);
            if trip.favorite != favorite {
                trip.favorite = favorite;
                changed = true;
            }
        }
        if changed {
            self.write_list(TRIPS_KEY, &trips).await?;
        }
        Ok(())
    }
}
