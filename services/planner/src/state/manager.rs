//! services/planner/src/state/manager.rs
//!
//! The travel state manager: the single in-memory authority for the session's
//! trips and favorites. It mediates between the local trip store and the
//! optional remote favorites store.
//!
//! State lives in a `watch` channel. Every change is applied inside one
//! `send_modify` call and no lock is held across a storage or network await,
//! so each operation's in-memory step is atomic while persistence may
//! interleave with other operations.

use chrono::Utc;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use trip_planner_core::domain::{PreferencesUpdate, Trip, TripId, TripReview, UserPreferences};
use trip_planner_core::ports::{
    FavoritesStream, LocalTripStore, PortError, RemoteFavoritesSync,
};

use super::session::{Session, TravelState};
use super::subscription::FavoritesSubscription;

//=========================================================================================
// The Manager Handle
//=========================================================================================

/// Cloneable handle; all clones share one state.
#[derive(Clone)]
pub struct TravelStateManager {
    inner: Arc<Inner>,
}

struct Inner {
    local: Arc<dyn LocalTripStore>,
    remote: Option<Arc<dyn RemoteFavoritesSync>>,
    state: watch::Sender<TravelState>,
    subscription: AsyncMutex<Option<FavoritesSubscription>>,
    last_issued_id: Mutex<i64>,
}

/// Keeps the loading flag raised for as long as it lives.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<TravelState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .send_modify(|s| s.loading_ops = s.loading_ops.saturating_sub(1));
    }
}

impl TravelStateManager {
    /// Creates a manager in the anonymous state. Without a remote store,
    /// signing in still works but favorites are never mirrored.
    pub fn new(
        local: Arc<dyn LocalTripStore>,
        remote: Option<Arc<dyn RemoteFavoritesSync>>,
    ) -> Self {
        let (state, _) = watch::channel(TravelState::default());
        Self {
            inner: Arc::new(Inner {
                local,
                remote,
                state,
                subscription: AsyncMutex::new(None),
                last_issued_id: Mutex::new(0),
            }),
        }
    }

    //-------------------------------------------------------------------------------------
    // Reads
    //-------------------------------------------------------------------------------------

    pub fn snapshot(&self) -> TravelState {
        self.inner.state.borrow().clone()
    }

    /// A receiver that is notified after every state change.
    pub fn watch(&self) -> watch::Receiver<TravelState> {
        self.inner.state.subscribe()
    }

    pub fn trips(&self) -> Vec<Trip> {
        self.inner.state.borrow().trips.clone()
    }

    pub fn favorites(&self) -> Vec<Trip> {
        self.inner.state.borrow().favorites.clone()
    }

    pub fn trip(&self, trip_id: &str) -> Option<Trip> {
        self.inner.state.borrow().trip(trip_id).cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    pub fn session(&self) -> Session {
        self.inner.state.borrow().session.clone()
    }

    pub fn preferences(&self) -> UserPreferences {
        self.inner.state.borrow().preferences.clone()
    }

    pub async fn has_subscription(&self) -> bool {
        self.inner.subscription.lock().await.is_some()
    }

    //-------------------------------------------------------------------------------------
    // Mutations
    //-------------------------------------------------------------------------------------

    /// Reads the saved trips into memory.
    ///
    /// Anonymous sessions derive favorites from the trips' flags. Signed-in
    /// sessions keep the favorites of the last remote snapshot and re-flag the
    /// loaded trips from it; until the first snapshot arrives the stored flags
    /// are used. A read failure is logged and leaves the state untouched.
    pub async fn load_data(&self) {
        let _loading = self.begin_loading();
        match self.inner.local.try_list().await {
            Ok(trips) => {
                let count = trips.len();
                self.inner.state.send_modify(|s| {
                    s.trips = trips;
                    if s.session.is_authenticated() && s.remote_snapshot_seen {
                        let ids = s.favorite_ids();
                        s.apply_favorite_ids(&ids);
                    } else {
                        s.recompute_favorites();
                    }
                });
                info!("Loaded {} saved trips", count);
            }
            Err(e) => error!("Error loading data: {}", e),
        }
    }

    /// Saves a new trip and returns its id.
    ///
    /// The trip gets a fresh id and starts as a non-favorite. It only appears
    /// in memory once it has been persisted.
    pub async fn add_trip(&self, mut trip: Trip) -> Option<TripId> {
        let _loading = self.begin_loading();
        trip.id = self.next_trip_id();
        trip.favorite = false;
        if trip.created_at.is_none() {
            trip.created_at = Some(Utc::now());
        }

        match self.inner.local.save(&trip).await {
            Ok(()) => {
                let id = trip.id.clone();
                self.inner.state.send_modify(|s| s.trips.push(trip));
                info!("Added trip {}", id);
                Some(id)
            }
            Err(e) => {
                error!("Error adding trip: {}", e);
                None
            }
        }
    }

    /// Deletes a trip locally, then mirrors the shrunken favorites remotely.
    ///
    /// Returns `false` if the local removal failed or the trip does not
    /// exist. A failed remote push does not undo the local removal.
    pub async fn delete_trip(&self, trip_id: &str) -> bool {
        let _loading = self.begin_loading();
        if let Err(e) = self.inner.local.remove(trip_id).await {
            match e {
                PortError::NotFound(_) => warn!("Cannot delete unknown trip {}", trip_id),
                e => error!("Error deleting trip {}: {}", trip_id, e),
            }
            return false;
        }

        let (favorites, user_id) = self.update(|s| {
            s.trips.retain(|t| t.id != trip_id);
            s.favorites.retain(|t| t.id != trip_id);
            (s.favorites.clone(), s.session.user_id().map(str::to_string))
        });
        info!("Deleted trip {}", trip_id);

        if let Some(user_id) = user_id {
            self.push_remote(&user_id, &favorites).await;
        }
        true
    }

    /// Flips a trip's favorite flag immediately, then persists and mirrors
    /// the new favorites list. Persistence failures are logged only; the
    /// in-memory change is not rolled back.
    ///
    /// Two toggles issued without awaiting each other, or a toggle racing a
    /// remote snapshot, resolve to whichever write lands last.
    pub async fn toggle_favorite(&self, trip_id: &str) -> bool {
        let outcome = self.update(|s| {
            let trip = s.trips.iter_mut().find(|t| t.id == trip_id)?;
            trip.favorite = !trip.favorite;
            s.recompute_favorites();
            Some((s.favorites.clone(), s.session.user_id().map(str::to_string)))
        });
        let Some((favorites, user_id)) = outcome else {
            warn!("Cannot toggle favorite of unknown trip {}", trip_id);
            return false;
        };

        self.persist_favorites(&favorites).await;
        if let Some(user_id) = user_id {
            self.push_remote(&user_id, &favorites).await;
        }
        true
    }

    /// Rates a trip from 1 to 5. The review is persisted before it shows in
    /// memory; favorites holding a copy of the trip are refreshed as well.
    pub async fn save_review(&self, trip_id: &str, rating: u8, comment: impl Into<String>) -> bool {
        if !(1..=5).contains(&rating) {
            warn!("Rejected review with rating {}", rating);
            return false;
        }
        let Some(mut trip) = self.trip(trip_id) else {
            warn!("Cannot review unknown trip {}", trip_id);
            return false;
        };
        let review = TripReview {
            rating,
            comment: comment.into(),
            reviewed_at: Some(Utc::now()),
        };
        trip.review = Some(review.clone());

        if let Err(e) = self.inner.local.update(&trip).await {
            error!("Error saving review for trip {}: {}", trip_id, e);
            return false;
        }

        let refreshed = self.update(|s| {
            if let Some(slot) = s.trips.iter_mut().find(|t| t.id == trip_id) {
                slot.review = Some(review.clone());
            }
            let favorite = s.favorites.iter_mut().find(|t| t.id == trip_id)?;
            favorite.review = Some(review);
            Some((s.favorites.clone(), s.session.user_id().map(str::to_string)))
        });

        if let Some((favorites, user_id)) = refreshed {
            self.persist_favorites(&favorites).await;
            if let Some(user_id) = user_id {
                self.push_remote(&user_id, &favorites).await;
            }
        }
        true
    }

    pub fn update_preferences(&self, update: PreferencesUpdate) {
        self.inner.state.send_modify(|s| s.preferences.apply(update));
    }

    //-------------------------------------------------------------------------------------
    // Session Transitions
    //-------------------------------------------------------------------------------------

    /// Signs a user in and subscribes to their remote favorites.
    ///
    /// Any previous subscription is released first, so snapshots are never
    /// delivered twice. If subscribing fails the session stays signed in and
    /// keeps working from local data.
    pub async fn set_user(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        let mut slot = self.inner.subscription.lock().await;
        if let Some(previous) = slot.take() {
            previous.unsubscribe().await;
        }

        self.inner.state.send_modify(|s| {
            s.session = Session::Authenticated {
                user_id: user_id.clone(),
            };
            s.remote_snapshot_seen = false;
        });
        info!("User {} signed in", user_id);

        let Some(remote) = self.inner.remote.clone() else {
            warn!("No remote favorites store configured; favorites stay local");
            return;
        };
        match remote.subscribe(&user_id).await {
            Ok(stream) => *slot = Some(self.spawn_subscription(user_id, stream)),
            Err(e) => warn!(
                "Failed to subscribe to remote favorites for {}: {}; continuing with local data",
                user_id, e
            ),
        }
    }

    /// Releases the remote subscription and returns to the anonymous state.
    /// Trips and favorites stay as they are.
    pub async fn sign_out(&self) {
        let mut slot = self.inner.subscription.lock().await;
        if let Some(subscription) = slot.take() {
            subscription.unsubscribe().await;
        }
        self.inner.state.send_modify(|s| {
            s.session = Session::Anonymous;
            s.remote_snapshot_seen = false;
        });
        info!("Signed out");
    }

    //-------------------------------------------------------------------------------------
    // Remote Reconciliation
    //-------------------------------------------------------------------------------------

    fn spawn_subscription(&self, user_id: String, mut stream: FavoritesStream) -> FavoritesSubscription {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let task_user = user_id.clone();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        let handle = tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = task_token.cancelled() => break,
                    next = stream.next() => next,
                };
                match next {
                    Some(Ok(favorites)) => {
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        TravelStateManager { inner }
                            .reconcile(&task_user, favorites)
                            .await;
                    }
                    Some(Err(e)) => {
                        warn!("Remote favorites error for user {}: {}", task_user, e);
                    }
                    None => {
                        info!("Remote favorites stream for user {} ended", task_user);
                        break;
                    }
                }
            }
        });

        FavoritesSubscription::new(user_id, token, handle)
    }

    /// Replaces the favorites with a remote snapshot (last write wins) and
    /// re-flags every trip from it. Snapshots for a user who is no longer
    /// signed in are dropped.
    async fn reconcile(&self, user_id: &str, incoming: Vec<Trip>) {
        let mut seen = HashSet::new();
        let incoming: Vec<Trip> = incoming
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .map(|mut t| {
                t.favorite = true;
                t
            })
            .collect();

        let applied = self.update(|s| {
            if s.session.user_id() != Some(user_id) {
                return None;
            }
            s.favorites = incoming;
            let ids = s.favorite_ids();
            s.apply_favorite_ids(&ids);
            s.remote_snapshot_seen = true;
            Some(s.favorites.clone())
        });

        match applied {
            Some(favorites) => {
                debug!("Applied {} remote favorites for user {}", favorites.len(), user_id);
                self.persist_favorites(&favorites).await;
            }
            None => debug!("Dropped remote snapshot for signed-out user {}", user_id),
        }
    }

    //-------------------------------------------------------------------------------------
    // Helpers
    //-------------------------------------------------------------------------------------

    fn update<R>(&self, f: impl FnOnce(&mut TravelState) -> R) -> R {
        let mut result = None;
        self.inner.state.send_modify(|s| result = Some(f(s)));
        result.expect("send_modify runs the closure exactly once")
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        self.inner.state.send_modify(|s| s.loading_ops += 1);
        LoadingGuard {
            state: &self.inner.state,
        }
    }

    /// Millisecond timestamp ids, bumped past the last issued id and any
    /// loaded trip with the same id.
    fn next_trip_id(&self) -> TripId {
        let mut last = self
            .inner
            .last_issued_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let state = self.inner.state.borrow();
        let mut candidate = Utc::now().timestamp_millis().max(*last + 1);
        while state.trips.iter().any(|t| t.id == candidate.to_string()) {
            candidate += 1;
        }
        *last = candidate;
        candidate.to_string()
    }

    /// Writes the favorites list and the matching trip flags locally.
    async fn persist_favorites(&self, favorites: &[Trip]) -> bool {
        let ids: HashSet<TripId> = favorites.iter().map(|t| t.id.clone()).collect();
        let saved = match self.inner.local.save_favorites(favorites).await {
            Ok(()) => true,
            Err(e) => {
                error!("Error saving favorites: {}", e);
                false
            }
        };
        let flagged = match self.inner.local.sync_favorite_flags(&ids).await {
            Ok(()) => true,
            Err(e) => {
                error!("Error updating favorite flags: {}", e);
                false
            }
        };
        saved && flagged
    }

    async fn push_remote(&self, user_id: &str, favorites: &[Trip]) -> bool {
        let Some(remote) = &self.inner.remote else {
            return false;
        };
        match remote.push(user_id, favorites).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to push favorites for user {}: {}", user_id, e);
                false
            }
        }
    }
}
