//! Per-game realtime channel: full snapshots pushed on every committed write,
//! with automatic reconnection after transport loss.

use std::{sync::Arc, time::Duration};

use async_stream::stream;
use futures::{StreamExt, stream::BoxStream};
use tokio::{sync::watch, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::game_store::GameStore,
    error::{GameError, GameResult},
    state::game::{Game, GameCode},
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// What a subscriber receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Current document; `None` when no game is stored under the code.
    Snapshot(Option<Game>),
    /// The link to the store is down; a fresh snapshot follows on reconnect.
    Disconnected,
}

/// Realtime subscriptions on top of a [`GameStore`] feed.
#[derive(Clone)]
pub struct RealtimeChannel {
    store: Arc<dyn GameStore>,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RealtimeChannel {
    /// Channel over `store` with the default reconnect backoff.
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self {
            store,
            initial_delay: INITIAL_DELAY,
            max_delay: MAX_DELAY,
        }
    }

    /// Override the reconnect backoff (doubling from `initial` up to `max`).
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max.max(initial);
        self
    }

    /// Current state of a game, read through a one-off subscription.
    ///
    /// A link that fails before the first snapshot yields
    /// [`GameError::TransportDisconnected`].
    pub async fn current(&self, code: &GameCode) -> GameResult<Option<Game>> {
        let mut feed = self.store.watch_game(code.to_string());
        match feed.next().await {
            Some(Ok(document)) => document.map(Game::try_from).transpose(),
            Some(Err(err)) => {
                warn!(code = %code, error = %err, "realtime link down before the first snapshot");
                Err(GameError::TransportDisconnected)
            }
            None => Err(GameError::TransportDisconnected),
        }
    }

    /// Follow a game: its current state first, then one snapshot per write.
    ///
    /// Transport loss yields a single [`ChannelEvent::Disconnected`] per outage;
    /// the stream reconnects on its own and never ends.
    pub fn subscribe(&self, code: GameCode) -> BoxStream<'static, ChannelEvent> {
        let store = self.store.clone();
        let initial_delay = self.initial_delay;
        let max_delay = self.max_delay;

        Box::pin(stream! {
            let mut delay = initial_delay;
            let mut announced_down = false;
            loop {
                let mut feed = store.watch_game(code.to_string());
                while let Some(item) = feed.next().await {
                    match item {
                        Ok(document) => {
                            if announced_down {
                                info!(code = %code, "realtime link restored");
                            }
                            announced_down = false;
                            delay = initial_delay;
                            match document.map(Game::try_from).transpose() {
                                Ok(game) => {
                                    debug!(code = %code, present = game.is_some(), "snapshot delivered");
                                    yield ChannelEvent::Snapshot(game);
                                }
                                Err(err) => {
                                    warn!(code = %code, error = %err, "skipping malformed game document");
                                }
                            }
                        }
                        Err(err) => {
                            warn!(code = %code, error = %err, "realtime link lost");
                            break;
                        }
                    }
                }

                if !announced_down {
                    announced_down = true;
                    yield ChannelEvent::Disconnected;
                }
                sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
        })
    }

    /// Callback form of [`Self::subscribe`], driven by a spawned task.
    ///
    /// The callback receives the handle so it can unsubscribe itself. Dropping
    /// the returned handle does not end the subscription.
    pub fn subscribe_with<F>(&self, code: GameCode, mut callback: F) -> SubscriptionHandle
    where
        F: FnMut(&SubscriptionHandle, ChannelEvent) + Send + 'static,
    {
        let handle = SubscriptionHandle::new();
        let task_handle = handle.clone();
        let mut cancelled = handle.cancel.subscribe();
        let mut events = self.subscribe(code.clone());

        tokio::spawn(async move {
            loop {
                if task_handle.is_unsubscribed() {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = cancelled.changed() => continue,
                    event = events.next() => match event {
                        Some(event) if !task_handle.is_unsubscribed() => callback(&task_handle, event),
                        _ => break,
                    },
                }
            }
            debug!(code = %code, "subscription closed");
        });

        handle
    }
}

/// Handle to a callback subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl SubscriptionHandle {
    fn new() -> Self {
        let (cancel, _receiver) = watch::channel(false);
        Self {
            cancel: Arc::new(cancel),
        }
    }

    /// Stop deliveries. Safe to call repeatedly and from inside the callback.
    pub fn unsubscribe(&self) {
        self.cancel.send_if_modified(|cancelled| !std::mem::replace(cancelled, true));
    }

    /// Whether `unsubscribe` was called.
    pub fn is_unsubscribed(&self) -> bool {
        *self.cancel.borrow()
    }
}
