/// CouchDB backend.
#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "relay-client")]
pub mod relay;

use futures::{future::BoxFuture, stream::BoxStream};

use crate::dao::models::{GameEntity, GamePatchEntity};
use crate::dao::storage::StorageResult;

pub use memory::MemoryGameStore;

/// Stream of document states for one game key.
///
/// The first item is the value at subscription time (`None` when absent),
/// followed by one item per committed write in commit order. An `Err` item
/// means the backend connection was lost; the stream ends right after it.
pub type GameFeed = BoxStream<'static, StorageResult<Option<GameEntity>>>;

/// Abstraction over the keyed document store holding one record per game.
///
/// There is no concurrency token: `update_game` always applies on top of
/// whatever is stored, so the last writer wins.
pub trait GameStore: Send + Sync {
    /// Insert a brand-new document, failing with `Conflict` if the key exists.
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<GameEntity>>;
    /// Point read by key.
    fn find_game(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Shallow-merge `patch` into the stored document, failing with `NotFound`.
    fn update_game(
        &self,
        id: String,
        patch: GamePatchEntity,
    ) -> BoxFuture<'static, StorageResult<GameEntity>>;
    /// Delete the document, returning whether something was removed.
    fn delete_game(&self, id: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Whether a document is stored under the key.
    fn game_exists(&self, id: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// Every stored document.
    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;
    /// Follow the document stored under the key.
    fn watch_game(&self, id: String) -> GameFeed;
    /// Cheap connectivity check.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
