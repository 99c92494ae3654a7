use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{game_store::GameStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Exponential delay doubling from [`INITIAL_DELAY`] up to [`MAX_DELAY`].
struct Backoff(Duration);

impl Backoff {
    fn new() -> Self {
        Self(INITIAL_DELAY)
    }

    fn reset(&mut self) {
        self.0 = INITIAL_DELAY;
    }

    async fn wait(&mut self) {
        sleep(self.0).await;
        self.0 = (self.0 * 2).min(MAX_DELAY);
    }
}

/// Connect the game store, then health-poll it for as long as the relay
/// runs. The relay stays degraded while no healthy store is installed.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let backend = state.backend();
    let mut backoff = Backoff::new();

    loop {
        match connect().await {
            Ok(store) => {
                state.set_game_store(store.clone()).await;
                info!(backend, "game store connected; leaving degraded mode");
                backoff.reset();

                watch_health(&state, store.as_ref()).await;
                warn!(backend, "game store lost; reconnecting from scratch");
                state.clear_game_store().await;
            }
            Err(err) => {
                warn!(backend, error = %err, "game store connection attempt failed");
            }
        }
        backoff.wait().await;
    }
}

/// Poll `store` until it stays unreachable after [`MAX_RECONNECT_ATTEMPTS`].
async fn watch_health(state: &SharedState, store: &dyn GameStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("game store healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
            }
            Err(err) => {
                warn!(error = %err, "game store health check failed; entering degraded mode");
                state.update_degraded(true);
                if !reconnect(store).await {
                    warn!("exhausted game store reconnect attempts");
                    return;
                }
                state.update_degraded(false);
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(store: &dyn GameStore) -> bool {
    let mut backoff = Backoff::new();
    for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "game store reconnected");
                return true;
            }
            Err(err) => {
                warn!(attempt, error = %err, "game store reconnect attempt failed");
                backoff.wait().await;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::{config::AppConfig, dao::game_store::MemoryGameStore, state::AppState};

    #[tokio::test]
    async fn successful_connection_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default(), "memory");
        let mut watcher = state.degraded_watcher();
        let supervisor = tokio::spawn(run(state.clone(), || async {
            Ok(Arc::new(MemoryGameStore::default()) as Arc<dyn GameStore>)
        }));

        timeout(Duration::from_secs(2), watcher.wait_for(|degraded| !degraded))
            .await
            .expect("supervisor never installed the store")
            .unwrap();
        assert!(state.require_game_store().await.is_ok());
        supervisor.abort();
    }
}
