//! services/planner/src/state/subscription.rs
//!
//! Handle for the one long-lived remote favorites subscription of a session.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Owns the task that applies remote snapshots. Unsubscribing, or dropping
/// the handle, cancels the task, which drops the remote stream and releases
/// the subscription.
pub struct FavoritesSubscription {
    user_id: String,
    cancellation_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl FavoritesSubscription {
    pub(crate) fn new(
        user_id: String,
        cancellation_token: CancellationToken,
        handle: JoinHandle<()>,
    ) -> Self {
        Self {
            user_id,
            cancellation_token,
            handle: Some(handle),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Cancels the task and waits for it to finish, so no snapshot is applied
    /// after this returns.
    pub async fn unsubscribe(mut self) {
        self.cancellation_token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        debug!("Unsubscribed from remote favorites for user {}", self.user_id);
    }
}

impl Drop for FavoritesSubscription {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
