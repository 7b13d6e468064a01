pub mod file_storage;
pub mod firebase_auth;
pub mod google_maps;
pub mod memory_favorites;
pub mod memory_storage;
pub mod realtime_db;
pub mod sse;

pub use file_storage::FileStorage;
pub use firebase_auth::FirebaseAuthAdapter;
pub use google_maps::GoogleMapsAdapter;
pub use memory_favorites::MemoryFavoritesStore;
pub use memory_storage::MemoryStorage;
pub use realtime_db::RealtimeDbAdapter;
