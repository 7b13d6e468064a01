//! services/planner/src/state/mod.rs
//!
//! The in-memory travel state and the manager that keeps it in sync with the
//! local trip store and the remote favorites store.

pub mod credentials;
pub mod manager;
pub mod session;
pub mod subscription;

pub use credentials::CredentialStore;
pub use manager::TravelStateManager;
pub use session::{Session, TravelState};
pub use subscription::FavoritesSubscription;
