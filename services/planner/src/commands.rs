//! services/planner/src/commands.rs
//!
//! Trip mutations run by the CLI. The manager reports them as plain success
//! flags; here an unknown trip and a failed write become different errors.

use crate::error::AppError;
use crate::state::TravelStateManager;

/// Flips the favorite flag and returns the new value.
pub async fn toggle_favorite(
    manager: &TravelStateManager,
    trip_id: &str,
) -> Result<bool, AppError> {
    known_trip(manager, trip_id)?;
    if !manager.toggle_favorite(trip_id).await {
        return Err(AppError::Internal("the favorite could not be changed".to_string()));
    }
    Ok(manager.trip(trip_id).map(|t| t.favorite).unwrap_or(false))
}

pub async fn delete_trip(manager: &TravelStateManager, trip_id: &str) -> Result<(), AppError> {
    known_trip(manager, trip_id)?;
    if !manager.delete_trip(trip_id).await {
        return Err(AppError::Internal("the trip could not be deleted".to_string()));
    }
    Ok(())
}

pub async fn review_trip(
    manager: &TravelStateManager,
    trip_id: &str,
    rating: u8,
    comment: String,
) -> Result<(), AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::InvalidInput(format!(
            "rating must be between 1 and 5, got {}",
            rating
        )));
    }
    known_trip(manager, trip_id)?;
    if !manager.save_review(trip_id, rating, comment).await {
        return Err(AppError::Internal("the review could not be saved".to_string()));
    }
    Ok(())
}

fn known_trip(manager: &TravelStateManager, trip_id: &str) -> Result<(), AppError> {
    match manager.trip(trip_id) {
        Some(_) => Ok(()),
        None => Err(AppError::InvalidInput(format!("no saved trip with id {}", trip_id))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStorage;
    use std::sync::Arc;
    use trip_planner_core::{LocalTripStore, Trip, TripStore};

    async fn manager_with_trip() -> (Arc<MemoryStorage>, TravelStateManager, String) {
        let storage = Arc::new(MemoryStorage::new());
        let store = Arc::new(TripStore::new(storage.clone())) as Arc<dyn LocalTripStore>;
        let manager = TravelStateManager::new(store, None);
        let id = manager.add_trip(Trip::default()).await.expect("saved");
        (storage, manager, id)
    }

    #[tokio::test]
    async fn unknown_trips_are_invalid_input() {
        let (_, manager, _) = manager_with_trip().await;
        assert!(matches!(
            review_trip(&manager, "missing", 4, String::new()).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            delete_trip(&manager, "missing").await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            toggle_favorite(&manager, "missing").await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn failed_review_writes_are_internal_errors() {
        let (storage, manager, id) = manager_with_trip().await;
        storage.set_fail_writes(true);

        match review_trip(&manager, &id, 4, "ok".to_string()).await {
            Err(AppError::Internal(message)) => assert!(message.contains("review")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(manager.trip(&id).expect("still saved").review.is_none());
    }

    #[tokio::test]
    async fn failed_deletes_are_internal_errors() {
        let (storage, manager, id) = manager_with_trip().await;
        storage.set_fail_writes(true);

        assert!(matches!(
            delete_trip(&manager, &id).await,
            Err(AppError::Internal(_))
        ));
        assert!(manager.trip(&id).is_some());
    }

    #[tokio::test]
    async fn successful_mutations() {
        let (_, manager, id) = manager_with_trip().await;

        assert!(toggle_favorite(&manager, &id).await.unwrap());
        review_trip(&manager, &id, 5, "great".to_string()).await.unwrap();
        assert_eq!(manager.trip(&id).unwrap().review.unwrap().rating, 5);
        delete_trip(&manager, &id).await.unwrap();
        assert!(manager.trip(&id).is_none());
    }
}
