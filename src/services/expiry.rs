//! Periodic removal of games older than the configured time to live.

use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::{
    dao::{game_store::GameStore, models::now_millis, storage::StorageResult},
    state::SharedState,
};

/// Delete every game created more than `ttl` before `now`. Returns how many
/// were removed.
pub async fn sweep_expired(store: &dyn GameStore, ttl: Duration, now: u64) -> StorageResult<usize> {
    let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    let cutoff = now.saturating_sub(ttl_ms);

    let mut removed = 0;
    for game in store.list_games().await? {
        if game.created_at >= cutoff {
            continue;
        }
        if store.delete_game(game.id.clone()).await? {
            debug!(code = %game.id, created_at = game.created_at, "expired game removed");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Sweep on every `expiry_sweep` tick; skipped while the relay is degraded.
pub async fn run(state: SharedState) {
    let ttl = state.config().game_ttl;
    let mut ticker = interval(state.config().expiry_sweep);

    loop {
        ticker.tick().await;
        let Ok(store) = state.require_game_store().await else {
            continue;
        };
        match sweep_expired(store.as_ref(), ttl, now_millis()).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "expired games swept"),
            Err(err) => warn!(error = %err, "expiry sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::dao::{
        game_store::MemoryGameStore,
        models::{GameConfigEntity, GameEntity, GameModeEntity, PhaseEntity, PlayerEntity,
            PlayerStatusEntity},
    };

    fn game(code: &str, created_at: u64) -> GameEntity {
        let host = Uuid::new_v4();
        GameEntity {
            id: code.into(),
            name: "OPS: HOST".into(),
            phase: PhaseEntity::Lobby,
            host_id: host,
            players: vec![PlayerEntity {
                id: host,
                name: "Host".into(),
                avatar: String::new(),
                status: PlayerStatusEntity::Alive,
                target_id: None,
                mission: None,
                eliminated_by: None,
                kill_count: 0,
                score: 0,
            }],
            kill_log: Vec::new(),
            config: GameConfigEntity {
                use_ai: false,
                difficulty: 2,
                age_range: String::new(),
                is_private: true,
                mode: GameModeEntity::Fun,
            },
            start_time: None,
            created_at,
            last_updated: created_at,
            revision: 0,
        }
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_games() {
        let store = MemoryGameStore::default();
        store.create_game(game("OLD1", 1_000)).await.unwrap();
        store.create_game(game("NEW1", 90_000)).await.unwrap();

        let removed = sweep_expired(&store, Duration::from_secs(60), 100_000)
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(!store.game_exists("OLD1".into()).await.unwrap());
        assert!(store.game_exists("NEW1".into()).await.unwrap());
    }
}
