use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    dao::models::{GameEntity, PhaseEntity, PlayerStatusEntity},
    dto::format_millis,
};

/// Listing entry returned by `GET /games`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GameSummary {
    /// Join code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Lifecycle phase.
    pub phase: PhaseEntity,
    /// Players who joined.
    pub players: usize,
    /// Players still alive.
    pub alive: usize,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<&GameEntity> for GameSummary {
    fn from(game: &GameEntity) -> Self {
        Self {
            code: game.id.clone(),
            name: game.name.clone(),
            phase: game.phase,
            players: game.players.len(),
            alive: game
                .players
                .iter()
                .filter(|player| player.status == PlayerStatusEntity::Alive)
                .count(),
            created_at: format_millis(game.created_at),
        }
    }
}

/// Shape of the `GET /games` response.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ListView {
    /// One [`GameSummary`] per game.
    #[default]
    Summary,
    /// Complete documents.
    Full,
}

/// Query string accepted by `GET /games`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListGamesQuery {
    /// Summaries (default) or whole documents.
    #[serde(default)]
    pub view: ListView,
}

/// Body of `GET /games`, shaped by [`ListView`].
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum GameListResponse {
    /// One summary per game.
    Summary(Vec<GameSummary>),
    /// Whole stored documents.
    Full(Vec<GameEntity>),
}

impl GameListResponse {
    /// Number of listed games.
    pub fn len(&self) -> usize {
        match self {
            GameListResponse::Summary(games) => games.len(),
            GameListResponse::Full(games) => games.len(),
        }
    }

    /// Whether no game is listed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
