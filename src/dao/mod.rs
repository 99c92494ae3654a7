/// Game document storage backends.
pub mod game_store;
/// Persisted document model definitions.
pub mod models;
/// Storage error abstraction shared by every backend.
pub mod storage;
