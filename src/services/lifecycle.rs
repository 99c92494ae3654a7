//! Client-side game lifecycle: every operation reads the latest document,
//! computes the next one with [`crate::state::rules`] and writes it back in a
//! single store update. Concurrent writers race; the last update wins.

use std::sync::Arc;

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AppConfig,
    dao::{
        game_store::GameStore,
        models::{GameEntity, GamePatchEntity, PlayerEntity, now_millis},
    },
    error::{GameError, GameResult},
    services::missions::{MissionCatalog, MissionProvider},
    state::{
        game::{Game, GameCode, GameConfig, Identity, Mission, Player, PlayerId, players_to_entities},
        rules::{self, Admission},
        state_machine::GamePhase,
    },
};

/// Entry point for the lifecycle operations of one device.
#[derive(Clone)]
pub struct GameEngine {
    store: Arc<dyn GameStore>,
    provider: Arc<dyn MissionProvider>,
    catalog: MissionCatalog,
}

impl GameEngine {
    /// Engine over `store`, padding missions from `catalog`.
    pub fn new(
        store: Arc<dyn GameStore>,
        provider: Arc<dyn MissionProvider>,
        catalog: MissionCatalog,
    ) -> Self {
        Self {
            store,
            provider,
            catalog,
        }
    }

    /// Engine padding with the catalog configured in `config`.
    pub fn from_config(
        store: Arc<dyn GameStore>,
        provider: Arc<dyn MissionProvider>,
        config: &AppConfig,
    ) -> Self {
        Self::new(store, provider, config.catalog().clone())
    }

    /// Store the engine writes to.
    pub fn store(&self) -> &Arc<dyn GameStore> {
        &self.store
    }

    /// Latest stored version of the game.
    pub async fn load(&self, code: &GameCode) -> GameResult<Game> {
        let entity = self
            .store
            .find_game(code.to_string())
            .await?
            .ok_or_else(|| GameError::NotFound {
                code: code.to_string(),
            })?;
        Game::try_from(entity)
    }

    /// Create a single-player lobby hosted by `host` under a fresh random code.
    ///
    /// A code collision surfaces as [`GameError::Conflict`]; callers retry.
    pub async fn create_game(&self, host: &Identity, config: GameConfig) -> GameResult<Game> {
        let code = GameCode::random(&mut rand::rng());
        let now = now_millis();
        let mut players = IndexMap::new();
        players.insert(host.id, Player::recruit(host));

        let game = Game {
            code,
            name: Game::default_name(&host.name),
            phase: GamePhase::Lobby,
            host: host.id,
            players,
            kill_log: Vec::new(),
            config,
            start_time: None,
            created_at: now,
            last_updated: now,
            revision: 0,
        };
        let entity = GameEntity::from(game);
        entity
            .validate()
            .map_err(|err| GameError::InvalidDocument {
                reason: err.to_string(),
            })?;

        let stored = self.store.create_game(entity).await?;
        info!(code = %stored.id, host = %host.id, "game created");
        Game::try_from(stored)
    }

    /// Add `identity` to the lobby, or return its existing player record.
    pub async fn join_game(&self, code: &GameCode, identity: &Identity) -> GameResult<Player> {
        let game = self.load(code).await?;
        match rules::admit_player(&game, identity)? {
            Admission::Returning(player) => {
                debug!(code = %code, player = %player.id, "player already in game");
                Ok(player)
            }
            Admission::Joined { player, next } => {
                PlayerEntity::from(player.clone())
                    .validate()
                    .map_err(|err| GameError::InvalidDocument {
                        reason: err.to_string(),
                    })?;
                self.store
                    .update_game(
                        code.to_string(),
                        GamePatchEntity {
                            players: Some(players_to_entities(&next.players)),
                            ..Default::default()
                        },
                    )
                    .await?;
                info!(code = %code, player = %player.id, "player joined");
                Ok(player)
            }
        }
    }

    /// Host-only: deal missions and targets and move the game to ACTIVE.
    pub async fn start_match(&self, code: &GameCode, caller: PlayerId) -> GameResult<Game> {
        let game = self.load(code).await?;
        let contestants = rules::contestants(&game, caller)?;
        let generated = self.generated_missions(&game, contestants.len()).await;

        // The provider call can take a while; players may have joined meanwhile.
        let game = self.load(code).await?;
        let mut order = rules::contestants(&game, caller)?;
        let missions: Vec<Mission> = {
            let mut rng = rand::rng();
            order.shuffle(&mut rng);
            self.catalog.pad(generated, order.len(), &mut rng)
        };

        let next = rules::deal_targets(&game, &order, &missions, now_millis())?;
        let stored = self
            .store
            .update_game(
                code.to_string(),
                GamePatchEntity {
                    phase: Some(next.phase.into()),
                    players: Some(players_to_entities(&next.players)),
                    start_time: next.start_time,
                    ..Default::default()
                },
            )
            .await?;
        info!(code = %code, players = order.len(), missions = missions.len(), "match started");
        Game::try_from(stored)
    }

    /// Record that `killer` fulfilled their mission on their current target.
    pub async fn record_elimination(&self, code: &GameCode, killer: PlayerId) -> GameResult<Game> {
        let game = self.load(code).await?;
        let next = rules::eliminate(&game, killer, Uuid::new_v4(), now_millis())?;

        let stored = self
            .store
            .update_game(
                code.to_string(),
                GamePatchEntity {
                    phase: Some(next.phase.into()),
                    players: Some(players_to_entities(&next.players)),
                    kill_log: Some(next.kill_log.iter().cloned().map(Into::into).collect()),
                    ..Default::default()
                },
            )
            .await?;

        let game = Game::try_from(stored)?;
        info!(code = %code, killer = %killer, alive = game.alive_count(), "elimination recorded");
        if game.phase.is_terminal() {
            info!(code = %code, "game finished");
        }
        Ok(game)
    }

    /// Stylized portrait for a captured photo (data URI). No fallback.
    pub async fn generate_portrait(&self, image: String) -> GameResult<String> {
        Ok(self.provider.generate_portrait(image).await?)
    }

    /// Missions from the provider, or none when it is off or failing.
    async fn generated_missions(&self, game: &Game, players: usize) -> Vec<Mission> {
        if !game.config.use_ai {
            return Vec::new();
        }

        let mut context = game.config.mode.context().to_string();
        if !game.config.age_range.trim().is_empty() {
            context.push_str(&format!(". Audience: {}", game.config.age_range.trim()));
        }

        match self
            .provider
            .generate_missions(players * 2, context, game.config.difficulty)
            .await
        {
            Ok(missions) => missions,
            Err(err) => {
                warn!(code = %game.code, error = %err, "falling back to the mission catalog");
                Vec::new()
            }
        }
    }
}
