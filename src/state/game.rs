//! Domain model of a game: codes, players, missions and the shared document.

use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use rand::Rng;
use uuid::Uuid;

use crate::{
    dao::models::{
        GameConfigEntity, GameEntity, GameModeEntity, KillEventEntity, MissionCategoryEntity,
        MissionEntity, PhaseEntity, PlayerEntity, PlayerStatusEntity,
    },
    dto::validation::{GAME_CODE_LEN, validate_game_code},
    error::GameError,
    state::state_machine::GamePhase,
};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Four character join code, always stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameCode(String);

impl GameCode {
    /// Normalize user input (surrounding whitespace, case) and validate it.
    pub fn parse(raw: &str) -> Result<Self, GameError> {
        let normalized = raw.trim().to_ascii_uppercase();
        validate_game_code(&normalized).map_err(|_| GameError::InvalidCode {
            raw: raw.to_string(),
        })?;
        Ok(Self(normalized))
    }

    /// Draw a uniformly random code.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..GAME_CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Uppercase code text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GameCode {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Stable player identifier, generated once per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Participation state of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Still hunting and hunted.
    Alive,
    /// Taken out by another player.
    Eliminated,
    /// Watching without a place in the target cycle.
    Spectator,
}

/// Mission difficulty tier; each tier is worth ten points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Difficulty {
    /// Tier 1.
    Easy,
    /// Tier 2.
    Medium,
    /// Tier 3.
    Hard,
}

impl Difficulty {
    /// Numeric tier, 1 to 3.
    pub fn tier(self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }

    /// Map any integer onto the nearest tier.
    pub fn clamped(value: i64) -> Self {
        match value {
            i64::MIN..=1 => Difficulty::Easy,
            2 => Difficulty::Medium,
            _ => Difficulty::Hard,
        }
    }
}

/// Theme of a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionCategory {
    /// Conversation and interaction.
    Social,
    /// Moving, touching, carrying.
    Physical,
    /// Drawing, inventing, crafting.
    Creative,
    /// Puzzles and wordplay.
    Logic,
    /// Getting a laugh.
    Humor,
    /// Going unnoticed.
    Stealth,
    /// Singing, acting, showing off.
    Performance,
}

impl MissionCategory {
    /// Case-insensitive lookup; anything unknown is filed under `Social`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "physical" => MissionCategory::Physical,
            "creative" => MissionCategory::Creative,
            "logic" => MissionCategory::Logic,
            "humor" | "humour" => MissionCategory::Humor,
            "stealth" => MissionCategory::Stealth,
            "performance" => MissionCategory::Performance,
            _ => MissionCategory::Social,
        }
    }
}

/// Task a player must get their target to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mission {
    /// Catalog or generated identifier.
    pub id: String,
    /// What has to happen for the elimination to count.
    pub description: String,
    /// Scoring tier.
    pub difficulty: Difficulty,
    /// Theme of the mission.
    pub category: MissionCategory,
}

/// One participant of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Device identity of the player.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Emoji or image data URI.
    pub avatar: String,
    /// Participation state.
    pub status: PlayerStatus,
    /// Player currently hunted; `None` outside ACTIVE or once alone.
    pub target: Option<PlayerId>,
    /// Mission to fulfil on the target.
    pub mission: Option<Mission>,
    /// Who took this player out.
    pub eliminated_by: Option<PlayerId>,
    /// Eliminations scored; never decreases.
    pub kill_count: u32,
    /// Points earned; never decreases.
    pub score: u32,
}

impl Player {
    /// Fresh lobby player: alive, no target, no mission, zero score.
    pub fn recruit(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            name: identity.name.clone(),
            avatar: identity.avatar.clone(),
            status: PlayerStatus::Alive,
            target: None,
            mission: None,
            eliminated_by: None,
            kill_count: 0,
            score: 0,
        }
    }

    /// Whether the player is still in the cycle.
    pub fn is_alive(&self) -> bool {
        self.status == PlayerStatus::Alive
    }
}

/// Who a device claims to be: id plus display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable id, reused across games.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Emoji or image data URI.
    pub avatar: String,
}

/// Entry of the kill log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillEvent {
    /// Unique event id.
    pub id: Uuid,
    /// Player credited with the elimination.
    pub killer: PlayerId,
    /// Player taken out.
    pub victim: PlayerId,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Mission the killer fulfilled.
    pub mission_desc: String,
}

/// Tone of the generated missions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    /// Anything goes among friends.
    Fun,
    /// Office-safe.
    FunCorporate,
    /// Low effort.
    Chill,
}

impl GameMode {
    /// Setting description handed to the content provider.
    pub fn context(self) -> &'static str {
        match self {
            GameMode::Fun => "Party with friends",
            GameMode::FunCorporate => "Office party, keep everything work-appropriate",
            GameMode::Chill => "Relaxed evening, low-effort missions only",
        }
    }
}

/// Options chosen by the host when creating a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Ask the content provider for missions before falling back to the catalog.
    pub use_ai: bool,
    /// Difficulty requested from the provider.
    pub difficulty: Difficulty,
    /// Free-form audience hint, may be empty.
    pub age_range: String,
    /// Hidden from public listings.
    pub is_private: bool,
    /// Tone of the missions.
    pub mode: GameMode,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            use_ai: false,
            difficulty: Difficulty::Medium,
            age_range: String::new(),
            is_private: true,
            mode: GameMode::Fun,
        }
    }
}

/// Shared game document as seen by the lifecycle rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    /// Join code and storage key.
    pub code: GameCode,
    /// Display name.
    pub name: String,
    /// Lifecycle phase.
    pub phase: GamePhase,
    /// Only player allowed to start the match.
    pub host: PlayerId,
    /// Join order is preserved.
    pub players: IndexMap<PlayerId, Player>,
    /// Eliminations in the order they were recorded.
    pub kill_log: Vec<KillEvent>,
    /// Options chosen at creation.
    pub config: GameConfig,
    /// Milliseconds since the Unix epoch; set when the match starts.
    pub start_time: Option<u64>,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Milliseconds since the Unix epoch of the last write.
    pub last_updated: u64,
    /// Write counter; informational only.
    pub revision: u64,
}

impl Game {
    /// Default display name derived from the host's name.
    pub fn default_name(host_name: &str) -> String {
        format!("OPS: {}", host_name.trim().to_uppercase())
    }

    /// Player with `id`, if they joined.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Alive players in join order.
    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|player| player.is_alive())
    }

    /// Number of alive players.
    pub fn alive_count(&self) -> usize {
        self.alive_players().count()
    }

    /// Whether `id` hosts this game.
    pub fn is_host(&self, id: PlayerId) -> bool {
        self.host == id
    }
}

impl From<PhaseEntity> for GamePhase {
    fn from(value: PhaseEntity) -> Self {
        match value {
            PhaseEntity::Lobby => GamePhase::Lobby,
            PhaseEntity::Active => GamePhase::Active,
            PhaseEntity::Finished => GamePhase::Finished,
        }
    }
}

impl From<GamePhase> for PhaseEntity {
    fn from(value: GamePhase) -> Self {
        match value {
            GamePhase::Lobby => PhaseEntity::Lobby,
            GamePhase::Active => PhaseEntity::Active,
            GamePhase::Finished => PhaseEntity::Finished,
        }
    }
}

impl From<PlayerStatusEntity> for PlayerStatus {
    fn from(value: PlayerStatusEntity) -> Self {
        match value {
            PlayerStatusEntity::Alive => PlayerStatus::Alive,
            PlayerStatusEntity::Eliminated => PlayerStatus::Eliminated,
            PlayerStatusEntity::Spectator => PlayerStatus::Spectator,
        }
    }
}

impl From<PlayerStatus> for PlayerStatusEntity {
    fn from(value: PlayerStatus) -> Self {
        match value {
            PlayerStatus::Alive => PlayerStatusEntity::Alive,
            PlayerStatus::Eliminated => PlayerStatusEntity::Eliminated,
            PlayerStatus::Spectator => PlayerStatusEntity::Spectator,
        }
    }
}

impl From<MissionCategoryEntity> for MissionCategory {
    fn from(value: MissionCategoryEntity) -> Self {
        match value {
            MissionCategoryEntity::Social => MissionCategory::Social,
            MissionCategoryEntity::Physical => MissionCategory::Physical,
            MissionCategoryEntity::Creative => MissionCategory::Creative,
            MissionCategoryEntity::Logic => MissionCategory::Logic,
            MissionCategoryEntity::Humor => MissionCategory::Humor,
            MissionCategoryEntity::Stealth => MissionCategory::Stealth,
            MissionCategoryEntity::Performance => MissionCategory::Performance,
        }
    }
}

impl From<MissionCategory> for MissionCategoryEntity {
    fn from(value: MissionCategory) -> Self {
        match value {
            MissionCategory::Social => MissionCategoryEntity::Social,
            MissionCategory::Physical => MissionCategoryEntity::Physical,
            MissionCategory::Creative => MissionCategoryEntity::Creative,
            MissionCategory::Logic => MissionCategoryEntity::Logic,
            MissionCategory::Humor => MissionCategoryEntity::Humor,
            MissionCategory::Stealth => MissionCategoryEntity::Stealth,
            MissionCategory::Performance => MissionCategoryEntity::Performance,
        }
    }
}

impl From<GameModeEntity> for GameMode {
    fn from(value: GameModeEntity) -> Self {
        match value {
            GameModeEntity::Fun => GameMode::Fun,
            GameModeEntity::FunCorporate => GameMode::FunCorporate,
            GameModeEntity::Chill => GameMode::Chill,
        }
    }
}

impl From<GameMode> for GameModeEntity {
    fn from(value: GameMode) -> Self {
        match value {
            GameMode::Fun => GameModeEntity::Fun,
            GameMode::FunCorporate => GameModeEntity::FunCorporate,
            GameMode::Chill => GameModeEntity::Chill,
        }
    }
}

impl From<MissionEntity> for Mission {
    fn from(value: MissionEntity) -> Self {
        Self {
            id: value.id,
            description: value.description,
            difficulty: Difficulty::clamped(i64::from(value.difficulty)),
            category: value.category.into(),
        }
    }
}

impl From<Mission> for MissionEntity {
    fn from(value: Mission) -> Self {
        Self {
            id: value.id,
            description: value.description,
            difficulty: value.difficulty.tier(),
            category: value.category.into(),
        }
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: PlayerId(value.id),
            name: value.name,
            avatar: value.avatar,
            status: value.status.into(),
            target: value.target_id.map(PlayerId),
            mission: value.mission.map(Into::into),
            eliminated_by: value.eliminated_by.map(PlayerId),
            kill_count: value.kill_count,
            score: value.score,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id.0,
            name: value.name,
            avatar: value.avatar,
            status: value.status.into(),
            target_id: value.target.map(|id| id.0),
            mission: value.mission.map(Into::into),
            eliminated_by: value.eliminated_by.map(|id| id.0),
            kill_count: value.kill_count,
            score: value.score,
        }
    }
}

impl From<KillEventEntity> for KillEvent {
    fn from(value: KillEventEntity) -> Self {
        Self {
            id: value.id,
            killer: PlayerId(value.killer_id),
            victim: PlayerId(value.victim_id),
            timestamp: value.timestamp,
            mission_desc: value.mission_desc,
        }
    }
}

impl From<KillEvent> for KillEventEntity {
    fn from(value: KillEvent) -> Self {
        Self {
            id: value.id,
            killer_id: value.killer.0,
            victim_id: value.victim.0,
            timestamp: value.timestamp,
            mission_desc: value.mission_desc,
        }
    }
}

impl From<GameConfigEntity> for GameConfig {
    fn from(value: GameConfigEntity) -> Self {
        Self {
            use_ai: value.use_ai,
            difficulty: Difficulty::clamped(i64::from(value.difficulty)),
            age_range: value.age_range,
            is_private: value.is_private,
            mode: value.mode.into(),
        }
    }
}

impl From<GameConfig> for GameConfigEntity {
    fn from(value: GameConfig) -> Self {
        Self {
            use_ai: value.use_ai,
            difficulty: value.difficulty.tier(),
            age_range: value.age_range,
            is_private: value.is_private,
            mode: value.mode.into(),
        }
    }
}

/// Convert a player collection back to its stored, join-ordered form.
pub fn players_to_entities(players: &IndexMap<PlayerId, Player>) -> Vec<PlayerEntity> {
    players.values().cloned().map(Into::into).collect()
}

impl TryFrom<GameEntity> for Game {
    type Error = GameError;

    fn try_from(value: GameEntity) -> Result<Self, Self::Error> {
        let code = GameCode::parse(&value.id).map_err(|_| GameError::InvalidDocument {
            reason: format!("malformed game code `{}`", value.id),
        })?;

        let mut players = IndexMap::with_capacity(value.players.len());
        for entity in value.players {
            let player = Player::from(entity);
            if players.insert(player.id, player).is_some() {
                return Err(GameError::InvalidDocument {
                    reason: format!("duplicate player in game `{code}`"),
                });
            }
        }

        let host = PlayerId(value.host_id);
        if !players.contains_key(&host) {
            return Err(GameError::InvalidDocument {
                reason: format!("host of game `{code}` is not a player"),
            });
        }

        Ok(Self {
            code,
            name: value.name,
            phase: value.phase.into(),
            host,
            players,
            kill_log: value.kill_log.into_iter().map(Into::into).collect(),
            config: value.config.into(),
            start_time: value.start_time,
            created_at: value.created_at,
            last_updated: value.last_updated,
            revision: value.revision,
        })
    }
}

impl From<Game> for GameEntity {
    fn from(value: Game) -> Self {
        Self {
            id: value.code.0,
            name: value.name,
            phase: value.phase.into(),
            host_id: value.host.0,
            players: value.players.into_values().map(Into::into).collect(),
            kill_log: value.kill_log.into_iter().map(Into::into).collect(),
            config: value.config.into(),
            start_time: value.start_time,
            created_at: value.created_at,
            last_updated: value.last_updated,
            revision: value.revision,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn code_parse_normalizes_case_and_whitespace() {
        assert_eq!(GameCode::parse(" ab1z ").unwrap().as_str(), "AB1Z");
        assert!(matches!(
            GameCode::parse("ab1"),
            Err(GameError::InvalidCode { raw }) if raw == "ab1"
        ));
    }

    #[test]
    fn random_codes_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = GameCode::random(&mut rng);
            assert!(validate_game_code(code.as_str()).is_ok());
        }
    }

    #[test]
    fn difficulty_clamps_to_tiers() {
        assert_eq!(Difficulty::clamped(-4), Difficulty::Easy);
        assert_eq!(Difficulty::clamped(0), Difficulty::Easy);
        assert_eq!(Difficulty::clamped(2), Difficulty::Medium);
        assert_eq!(Difficulty::clamped(9), Difficulty::Hard);
    }

    #[test]
    fn unknown_category_defaults_to_social() {
        assert_eq!(MissionCategory::from_label("STEALTH"), MissionCategory::Stealth);
        assert_eq!(MissionCategory::from_label("dance"), MissionCategory::Social);
    }

    #[test]
    fn default_name_uppercases_host() {
        assert_eq!(Game::default_name(" Alice "), "OPS: ALICE");
    }

    fn sample_entity() -> GameEntity {
        let host = Uuid::new_v4();
        GameEntity {
            id: "AB12".into(),
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
                use_ai: true,
                difficulty: 3,
                age_range: "18+".into(),
                is_private: false,
                mode: GameModeEntity::FunCorporate,
            },
            start_time: None,
            created_at: 10,
            last_updated: 11,
            revision: 1,
        }
    }

    #[test]
    fn entity_conversion_preserves_document() {
        let entity = sample_entity();
        let game = Game::try_from(entity.clone()).unwrap();
        assert_eq!(game.config.difficulty, Difficulty::Hard);
        assert_eq!(GameEntity::from(game), entity);
    }

    #[test]
    fn duplicate_players_are_rejected() {
        let mut entity = sample_entity();
        entity.players.push(entity.players[0].clone());
        assert!(matches!(
            Game::try_from(entity),
            Err(GameError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn missing_host_is_rejected() {
        let mut entity = sample_entity();
        entity.host_id = Uuid::new_v4();
        assert!(matches!(
            Game::try_from(entity),
            Err(GameError::InvalidDocument { .. })
        ));
    }
}
