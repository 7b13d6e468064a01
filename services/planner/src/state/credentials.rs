//! services/planner/src/state/credentials.rs
//!
//! Keeps the signed-in `AuthSession` between runs, next to the trips in the
//! same key-value storage.

use std::sync::Arc;
use tracing::warn;
use trip_planner_core::domain::AuthSession;
use trip_planner_core::ports::{KeyValueStorage, PortError, PortResult};

pub const SESSION_KEY: &str = "@trip_planner_session";

#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// The stored session, if any. A corrupt entry reads as signed out.
    pub async fn load(&self) -> Option<AuthSession> {
        let raw = match self.storage.get_item(SESSION_KEY).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Could not read the stored session");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, "Ignoring a corrupt stored session");
                None
            }
        }
    }

    pub async fn save(&self, session: &AuthSession) -> PortResult<()> {
        let raw =
            serde_json::to_string(session).map_err(|e| PortError::Serialization(e.to_string()))?;
        self.storage.set_item(SESSION_KEY, &raw).await
    }

    pub async fn clear(&self) -> PortResult<()> {
        self.storage.remove_item(SESSION_KEY).await
    }
}
