#![allow(dead_code)]

use std::{
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::{
    StreamExt,
    future::BoxFuture,
    stream::{self, BoxStream},
};
use killer_party_sync::{
    config::AppConfig,
    dao::{
        game_store::{GameFeed, GameStore, MemoryGameStore},
        models::{GameEntity, GamePatchEntity},
        storage::{StorageError, StorageResult},
    },
    services::{
        channel::RealtimeChannel,
        lifecycle::GameEngine,
        missions::{MissionProvider, ProviderError},
    },
    state::game::{Difficulty, Identity, Mission, MissionCategory, PlayerId},
};
use tokio::time::timeout;

pub const WAIT: Duration = Duration::from_secs(2);

pub fn identity(name: &str) -> Identity {
    Identity {
        id: PlayerId::new(),
        name: name.to_string(),
        avatar: String::new(),
    }
}

pub fn engine(store: Arc<dyn GameStore>, provider: Arc<dyn MissionProvider>) -> GameEngine {
    GameEngine::from_config(store, provider, &AppConfig::default())
}

pub fn fast_channel(store: Arc<dyn GameStore>) -> RealtimeChannel {
    RealtimeChannel::new(store).with_backoff(Duration::from_millis(10), Duration::from_millis(40))
}

/// Next stream item, failing the test if it takes too long.
pub async fn next<T>(stream: &mut BoxStream<'static, T>) -> T {
    timeout(WAIT, stream.next())
        .await
        .expect("no item within the deadline")
        .expect("stream ended")
}

/// Provider returning a fixed list and recording the requested counts.
#[derive(Clone, Default)]
pub struct StubProvider {
    missions: Vec<Mission>,
    requests: Arc<Mutex<Vec<usize>>>,
}

impl StubProvider {
    pub fn returning(missions: Vec<Mission>) -> Self {
        Self {
            missions,
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<usize> {
        self.requests.lock().unwrap().clone()
    }
}

impl MissionProvider for StubProvider {
    fn generate_missions(
        &self,
        count: usize,
        _context: String,
        _difficulty: Difficulty,
    ) -> BoxFuture<'static, Result<Vec<Mission>, ProviderError>> {
        self.requests.lock().unwrap().push(count);
        let missions = self.missions.clone();
        Box::pin(async move { Ok(missions) })
    }
}

pub fn generated_mission(id: &str) -> Mission {
    Mission {
        id: id.to_string(),
        description: format!("Generated mission {id}"),
        difficulty: Difficulty::Hard,
        category: MissionCategory::Stealth,
    }
}

/// Memory store whose first `drops` watches lose their link after
/// delivering `delivered` items.
#[derive(Clone)]
pub struct FlakyStore {
    inner: MemoryGameStore,
    drops: Arc<AtomicUsize>,
    delivered: usize,
    watches: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(drops: usize) -> Self {
        Self {
            inner: MemoryGameStore::default(),
            drops: Arc::new(AtomicUsize::new(drops)),
            delivered: 1,
            watches: Arc::default(),
        }
    }

    /// Writes succeed but every watch fails before its first snapshot.
    pub fn offline() -> Self {
        Self {
            delivered: 0,
            ..Self::new(usize::MAX)
        }
    }

    pub fn watches(&self) -> usize {
        self.watches.load(Ordering::SeqCst)
    }
}

impl GameStore for FlakyStore {
    fn create_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<GameEntity>> {
        self.inner.create_game(game)
    }

    fn find_game(&self, id: String) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        self.inner.find_game(id)
    }

    fn update_game(
        &self,
        id: String,
        patch: GamePatchEntity,
    ) -> BoxFuture<'static, StorageResult<GameEntity>> {
        self.inner.update_game(id, patch)
    }

    fn delete_game(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.delete_game(id)
    }

    fn game_exists(&self, id: String) -> BoxFuture<'static, StorageResult<bool>> {
        self.inner.game_exists(id)
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        self.inner.list_games()
    }

    fn watch_game(&self, id: String) -> GameFeed {
        self.watches.fetch_add(1, Ordering::SeqCst);
        let dropping = self
            .drops
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !dropping {
            return self.inner.watch_game(id);
        }

        let lost = stream::once(async {
            Err(StorageError::unavailable(
                "link dropped".into(),
                io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"),
            ))
        });
        self.inner.watch_game(id).take(self.delivered).chain(lost).boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}
