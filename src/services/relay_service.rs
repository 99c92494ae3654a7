//! Store operations exposed by the relay's REST surface.

use tracing::info;

use crate::{
    dao::models::{GameEntity, GamePatchEntity},
    dto::game::{GameListResponse, GameSummary, ListView},
    error::ServiceError,
    state::{SharedState, game::GameCode},
};

/// Normalize a path segment into a game code.
pub fn parse_code(raw: &str) -> Result<GameCode, ServiceError> {
    GameCode::parse(raw).map_err(|err| ServiceError::InvalidInput(err.to_string()))
}

/// Store a new game; its code must be free.
pub async fn create_game(state: &SharedState, game: GameEntity) -> Result<GameEntity, ServiceError> {
    let code = parse_code(&game.id)?;
    if !game.players.iter().any(|player| player.id == game.host_id) {
        return Err(ServiceError::InvalidInput(format!(
            "host of game `{code}` is not listed among its players"
        )));
    }

    let store = state.require_game_store().await?;
    let stored = store
        .create_game(GameEntity {
            id: code.to_string(),
            ..game
        })
        .await?;
    info!(code = %stored.id, "game created through relay");
    Ok(stored)
}

/// Every stored game, oldest first.
pub async fn list_games(
    state: &SharedState,
    view: ListView,
) -> Result<GameListResponse, ServiceError> {
    let store = state.require_game_store().await?;
    let mut games = store.list_games().await?;
    games.sort_by_key(|game| game.created_at);

    Ok(match view {
        ListView::Summary => GameListResponse::Summary(games.iter().map(GameSummary::from).collect()),
        ListView::Full => GameListResponse::Full(games),
    })
}

/// Stored document of one game.
pub async fn get_game(state: &SharedState, raw_code: &str) -> Result<GameEntity, ServiceError> {
    let code = parse_code(raw_code)?;
    let store = state.require_game_store().await?;
    store
        .find_game(code.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{code}`")))
}

/// Whether a game is stored under the code.
pub async fn game_exists(state: &SharedState, raw_code: &str) -> Result<bool, ServiceError> {
    let code = parse_code(raw_code)?;
    let store = state.require_game_store().await?;
    Ok(store.game_exists(code.to_string()).await?)
}

/// Shallow-merge `patch` into the stored game; the last write wins.
pub async fn update_game(
    state: &SharedState,
    raw_code: &str,
    patch: GamePatchEntity,
) -> Result<GameEntity, ServiceError> {
    let code = parse_code(raw_code)?;
    if patch.is_empty() {
        return Err(ServiceError::InvalidInput("patch mentions no field".into()));
    }
    let store = state.require_game_store().await?;
    Ok(store.update_game(code.to_string(), patch).await?)
}

/// Remove a game; `NotFound` when absent.
pub async fn delete_game(state: &SharedState, raw_code: &str) -> Result<bool, ServiceError> {
    let code = parse_code(raw_code)?;
    let store = state.require_game_store().await?;
    let removed = store.delete_game(code.to_string()).await?;
    if removed {
        info!(code = %code, "game deleted through relay");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            game_store::MemoryGameStore,
            models::{
                GameConfigEntity, GameModeEntity, PhaseEntity, PlayerEntity, PlayerStatusEntity,
            },
        },
        state::AppState,
    };

    async fn ready_state() -> SharedState {
        let state = AppState::new(AppConfig::default(), "memory");
        state.set_game_store(Arc::new(MemoryGameStore::default())).await;
        state
    }

    fn lobby(code: &str) -> GameEntity {
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
                difficulty: 1,
                age_range: String::new(),
                is_private: true,
                mode: GameModeEntity::Chill,
            },
            start_time: None,
            created_at: 1,
            last_updated: 1,
            revision: 0,
        }
    }

    #[tokio::test]
    async fn degraded_relay_rejects_requests() {
        let state = AppState::new(AppConfig::default(), "memory");
        assert!(matches!(
            get_game(&state, "AB12").await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn create_then_duplicate_conflicts() {
        let state = ready_state().await;
        create_game(&state, lobby("AB12")).await.unwrap();
        assert!(matches!(
            create_game(&state, lobby("AB12")).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(game_exists(&state, "ab12").await.unwrap());
    }

    #[tokio::test]
    async fn create_requires_host_among_players() {
        let state = ready_state().await;
        let mut game = lobby("AB12");
        game.host_id = Uuid::new_v4();
        assert!(matches!(
            create_game(&state, game).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn patch_and_delete_follow_store_semantics() {
        let state = ready_state().await;
        create_game(&state, lobby("AB12")).await.unwrap();

        assert!(matches!(
            update_game(&state, "AB12", GamePatchEntity::default()).await,
            Err(ServiceError::InvalidInput(_))
        ));
        let patched = update_game(
            &state,
            "AB12",
            GamePatchEntity {
                phase: Some(PhaseEntity::Finished),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(patched.phase, PhaseEntity::Finished);

        assert!(delete_game(&state, "AB12").await.unwrap());
        assert!(!delete_game(&state, "AB12").await.unwrap());
        assert!(matches!(
            get_game(&state, "AB12").await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            update_game(
                &state,
                "AB12",
                GamePatchEntity {
                    start_time: Some(3),
                    ..Default::default()
                }
            )
            .await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_honours_the_requested_view() {
        let state = ready_state().await;
        create_game(&state, lobby("AB12")).await.unwrap();
        create_game(&state, lobby("CD34")).await.unwrap();

        match list_games(&state, ListView::Summary).await.unwrap() {
            GameListResponse::Summary(games) => {
                assert_eq!(games.len(), 2);
                assert!(games.iter().all(|game| game.alive == 1));
            }
            other => panic!("unexpected listing {other:?}"),
        }
        assert!(matches!(
            list_games(&state, ListView::Full).await.unwrap(),
            GameListResponse::Full(games) if games.len() == 2
        ));
    }

    #[test]
    fn malformed_codes_are_invalid_input() {
        assert!(matches!(parse_code("A-12"), Err(ServiceError::InvalidInput(_))));
        assert_eq!(parse_code("ab12").unwrap().as_str(), "AB12");
    }
}
