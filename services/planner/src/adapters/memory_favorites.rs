//! services/planner/src/adapters/memory_favorites.rs
//!
//! An in-process remote favorites store built on `tokio::sync::watch`. Each
//! user has one channel; subscribers see the current value first and then
//! every later push. It stands in for the realtime database in tests and
//! offline demos.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use trip_planner_core::domain::Trip;
use trip_planner_core::ports::{FavoritesStream, PortError, PortResult, RemoteFavoritesSync};

#[derive(Default)]
pub struct MemoryFavoritesStore {
    users: Mutex<HashMap<String, Arc<watch::Sender<Vec<Trip>>>>>,
    offline: AtomicBool,
}

impl MemoryFavoritesStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, user_id: &str) -> Arc<watch::Sender<Vec<Trip>>> {
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        users
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(watch::channel(Vec::new()).0))
            .clone()
    }

    /// Sets a user's remote favorites as if written by another device.
    pub fn seed(&self, user_id: &str, favorites: Vec<Trip>) {
        self.channel(user_id).send_replace(favorites);
    }

    pub fn current(&self, user_id: &str) -> Vec<Trip> {
        self.channel(user_id).borrow().clone()
    }

    /// Number of live subscriptions for a user.
    pub fn subscriber_count(&self, user_id: &str) -> usize {
        self.channel(user_id).receiver_count()
    }

    /// While offline, `subscribe` and `push` fail with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> PortResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PortError::Network("remote store unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteFavoritesSync for MemoryFavoritesStore {
    async fn subscribe(&self, user_id: &str) -> PortResult<FavoritesStream> {
        self.check_online()?;
        let mut receiver = self.channel(user_id).subscribe();

        Ok(Box::pin(async_stream::stream! {
            let current = receiver.borrow_and_update().clone();
            yield Ok(current);
            while receiver.changed().await.is_ok() {
                let next = receiver.borrow_and_update().clone();
                yield Ok(next);
            }
        }))
    }

    async fn push(&self, user_id: &str, favorites: &[Trip]) -> PortResult<()> {
        self.check_online()?;
        self.channel(user_id).send_replace(favorites.to_vec());
        Ok(())
    }
}
