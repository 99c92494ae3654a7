//! Process-local store keeping every game document in memory.

use std::{future::ready, sync::Arc};

use async_stream::stream;
use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use super::{GameFeed, GameStore};
use crate::dao::{
    models::{GameEntity, GamePatchEntity, now_millis},
    storage::{StorageError, StorageResult},
};

const DEFAULT_FEED_CAPACITY: usize = 16;

/// In-memory [`GameStore`] with per-key change broadcasting.
///
/// Writes and their notifications happen under the same map shard lock, so
/// watchers of one key observe writes in commit order.
#[derive(Clone)]
pub struct MemoryGameStore {
    slots: Arc<DashMap<String, Slot>>,
    feed_capacity: usize,
}

struct Slot {
    document: Option<GameEntity>,
    changes: broadcast::Sender<Option<GameEntity>>,
}

impl Slot {
    fn new(capacity: usize) -> Self {
        let (changes, _receiver) = broadcast::channel(capacity);
        Self {
            document: None,
            changes,
        }
    }

    fn publish(&mut self, document: Option<GameEntity>) {
        self.document = document.clone();
        let _ = self.changes.send(document);
    }
}

impl Default for MemoryGameStore {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl MemoryGameStore {
    /// Build an empty store whose per-game feeds buffer `feed_capacity` writes.
    pub fn new(feed_capacity: usize) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            feed_capacity: feed_capacity.max(1),
        }
    }

    fn create(&self, mut game: GameEntity) -> StorageResult<GameEntity> {
        let capacity = self.feed_capacity;
        let mut slot = self
            .slots
            .entry(game.id.clone())
            .or_insert_with(|| Slot::new(capacity));

        if slot.document.is_some() {
            return Err(StorageError::conflict(game.id));
        }

        game.revision = 0;
        game.stamp(now_millis());
        slot.publish(Some(game.clone()));
        Ok(game)
    }

    fn find(&self, id: &str) -> Option<GameEntity> {
        self.slots.get(id).and_then(|slot| slot.document.clone())
    }

    fn update(&self, id: String, patch: GamePatchEntity) -> StorageResult<GameEntity> {
        let Some(mut slot) = self.slots.get_mut(&id) else {
            return Err(StorageError::not_found(id));
        };
        let Some(mut game) = slot.document.clone() else {
            return Err(StorageError::not_found(id));
        };

        game.apply_patch(patch, now_millis());
        slot.publish(Some(game.clone()));
        Ok(game)
    }

    fn delete(&self, id: &str) -> bool {
        let removed = match self.slots.get_mut(id) {
            Some(mut slot) if slot.document.is_some() => {
                slot.publish(None);
                true
            }
            _ => false,
        };

        self.slots
            .remove_if(id, |_, slot| slot.changes.receiver_count() == 0);
        removed
    }

    fn list(&self) -> Vec<GameEntity> {
        self.slots
            .iter()
            .filter_map(|slot| slot.document.clone())
            .collect()
    }

    fn watch(&self, id: String) -> GameFeed {
        let capacity = self.feed_capacity;
        let (current, receiver) = {
            let slot = self
                .slots
                .entry(id.clone())
                .or_insert_with(|| Slot::new(capacity));
            (slot.document.clone(), slot.changes.subscribe())
        };
        let mut watcher = Watcher {
            id,
            slots: self.slots.clone(),
            receiver: Some(receiver),
        };

        Box::pin(stream! {
            yield Ok::<_, StorageError>(current);
            loop {
                match watcher.recv().await {
                    Ok(document) => yield Ok(document),
                    Err(RecvError::Lagged(skipped)) => {
                        // Older buffered writes are superseded by the current value.
                        debug!(game = %watcher.id, skipped, "game feed lagged; resynchronizing");
                        yield Ok(watcher.resubscribe());
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Receiving end of one feed.
///
/// Dropping the last watcher of a key that holds no document frees its slot.
struct Watcher {
    id: String,
    slots: Arc<DashMap<String, Slot>>,
    receiver: Option<broadcast::Receiver<Option<GameEntity>>>,
}

impl Watcher {
    async fn recv(&mut self) -> Result<Option<GameEntity>, RecvError> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => Err(RecvError::Closed),
        }
    }

    /// Skip to the live end of the feed and return the stored value.
    fn resubscribe(&mut self) -> Option<GameEntity> {
        if let Some(receiver) = self.receiver.as_mut() {
            *receiver = receiver.resubscribe();
        }
        self.slots.get(&self.id).and_then(|slot| slot.document.clone())
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        drop(self.receiver.take());
        self.slots.remove_if(&self.id, |_, slot| {
            slot.document.is_none() && slot.changes.receiver_count() == 0
        });
    }
}

impl GameStore for MemoryGameStore {
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<GameEntity>> {
        Box::pin(ready(self.create(game)))
    }

    fn find_game(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        Box::pin(ready(Ok(self.find(&id))))
    }

    fn update_game(
        &self,
        id: String,
        patch: GamePatchEntity,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        Box::pin(ready(self.update(id, patch)))
    }

    fn delete_game(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        Box::pin(ready(Ok(self.delete(&id))))
    }

    fn game_exists(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        Box::pin(ready(Ok(self.find(&id).is_some())))
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        Box::pin(ready(Ok(self.list())))
    }

    fn watch_game(&self, id: String) -> GameFeed {
        self.watch(id)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }
}
