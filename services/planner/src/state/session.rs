//! services/planner/src/state/session.rs
//!
//! The in-memory travel state published to UI consumers.

use std::collections::HashSet;
use trip_planner_core::domain::{Trip, TripId, UserPreferences};

/// The sign-in state of the current app session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    /// No remote account; favorites are purely local.
    #[default]
    Anonymous,
    /// Favorite mutations are mirrored to the user's remote store.
    Authenticated { user_id: String },
}

impl Session {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated { user_id } => Some(user_id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }
}

/// A snapshot of everything the manager holds.
///
/// `favorites` is a cached copy, not a view of `trips`: every mutation path
/// refreshes it and the trips' `favorite` flags together.
#[derive(Debug, Clone, Default)]
pub struct TravelState {
    pub trips: Vec<Trip>,
    pub favorites: Vec<Trip>,
    pub session: Session,
    pub preferences: UserPreferences,
    pub(crate) loading_ops: usize,
    /// Set once a remote snapshot has been applied for the current user.
    pub(crate) remote_snapshot_seen: bool,
}

impl TravelState {
    pub fn is_loading(&self) -> bool {
        self.loading_ops > 0
    }

    /// Whether a remote snapshot has been applied since the current user
    /// signed in.
    pub fn has_remote_snapshot(&self) -> bool {
        self.remote_snapshot_seen
    }

    pub fn trip(&self, trip_id: &str) -> Option<&Trip> {
        self.trips.iter().find(|t| t.id == trip_id)
    }

    pub fn favorite_ids(&self) -> HashSet<TripId> {
        self.favorites.iter().map(|t| t.id.clone()).collect()
    }

    /// Rebuilds the favorites cache from the trips' flags.
    pub(crate) fn recompute_favorites(&mut self) {
        self.favorites = self.trips.iter().filter(|t| t.favorite).cloned().collect();
    }

    /// Sets each trip's flag from membership in `ids`.
    pub(crate) fn apply_favorite_ids(&mut self, ids: &HashSet<TripId>) {
        for trip in self.trips.iter_mut() {
            trip.favorite = ids.contains(&trip.id);
        }
    }

    /// Whether every trip's flag agrees with the favorites cache.
    pub fn favorites_consistent(&self) -> bool {
        let ids = self.favorite_ids();
        self.trips.iter().all(|t| t.favorite == ids.contains(&t.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(id: &str, favorite: bool) -> Trip {
        Trip {
            id: id.to_string(),
            favorite,
            ..Default::default()
        }
    }

    #[test]
    fn recompute_filters_flagged_trips() {
        let mut state = TravelState {
            trips: vec![trip("a", true), trip("b", false), trip("c", true)],
            ..Default::default()
        };
        state.recompute_favorites();
        let ids: Vec<_> = state.favorites.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert!(state.favorites_consistent());
    }

    #[test]
    fn applying_ids_clears_missing_flags() {
        let mut state = TravelState {
            trips: vec![trip("a", true), trip("b", false)],
            ..Default::default()
        };
        let ids: HashSet<TripId> = ["b".to_string()].into_iter().collect();
        state.apply_favorite_ids(&ids);
        assert!(!state.trips[0].favorite);
        assert!(state.trips[1].favorite);
    }

    #[test]
    fn anonymous_session_has_no_user() {
        assert_eq!(Session::default().user_id(), None);
        let session = Session::Authenticated {
            user_id: "u1".to_string(),
        };
        assert_eq!(session.user_id(), Some("u1"));
    }
}
