use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::validation::validate_game_code;

/// Lifecycle phase as stored in the document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseEntity {
    /// Players are gathering; no targets yet.
    Lobby,
    /// Targets and missions are assigned.
    Active,
    /// One player (or none) remains alive.
    Finished,
}

/// Player status as stored in the document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatusEntity {
    /// Still hunting and being hunted.
    Alive,
    /// Removed from the target cycle.
    Eliminated,
    /// Watching without taking part.
    Spectator,
}

/// Mission category tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub enum MissionCategoryEntity {
    /// Conversation based.
    Social,
    /// Light physical action.
    Physical,
    /// Drawing, photos, crafting.
    Creative,
    /// Riddles and puzzles.
    Logic,
    /// Make them laugh.
    Humor,
    /// Do it without being noticed.
    Stealth,
    /// Sing, dance, act.
    Performance,
}

/// Flavour of mission content requested from the content provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameModeEntity {
    /// Party between friends.
    Fun,
    /// Office party, safe for work.
    FunCorporate,
    /// Low effort, relaxed missions.
    Chill,
}

/// Secret task assigned to a player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MissionEntity {
    /// Catalog or generated identifier.
    pub id: String,
    /// Natural-language description of the task.
    pub description: String,
    /// Difficulty tier, 1 to 3.
    pub difficulty: u8,
    /// Category tag.
    pub category: MissionCategoryEntity,
}

/// Settings fixed when the game is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameConfigEntity {
    /// Whether missions are requested from the content provider.
    #[serde(rename = "useAI")]
    pub use_ai: bool,
    /// Requested difficulty tier, 1 to 3.
    pub difficulty: u8,
    /// Audience hint forwarded to the content provider.
    #[serde(default)]
    pub age_range: String,
    /// Whether the game is hidden from public listings.
    #[serde(default)]
    pub is_private: bool,
    /// Mission flavour.
    pub mode: GameModeEntity,
}

/// Player record embedded in a game document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntity {
    /// Stable identifier chosen by the player's device.
    pub id: Uuid,
    /// Display name.
    #[validate(length(min = 1, max = 20))]
    pub name: String,
    /// Opaque avatar reference (URL or data URI).
    pub avatar: String,
    /// Current status.
    pub status: PlayerStatusEntity,
    /// Player currently hunted by this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<Uuid>,
    /// Mission currently assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission: Option<MissionEntity>,
    /// Player who eliminated this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eliminated_by: Option<Uuid>,
    /// Number of eliminations performed.
    #[serde(default)]
    pub kill_count: u32,
    /// Accumulated score.
    #[serde(default)]
    pub score: u32,
}

/// Entry of the append-only kill log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KillEventEntity {
    /// Unique identifier of the event.
    pub id: Uuid,
    /// Player who performed the elimination.
    pub killer_id: Uuid,
    /// Player who was eliminated.
    pub victim_id: Uuid,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Mission fulfilled by the killer.
    pub mission_desc: String,
}

/// Aggregate game document persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GameEntity {
    /// Four character join code, primary key.
    #[validate(custom(function = "validate_game_code"))]
    pub id: String,
    /// Display name of the game.
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    /// Lifecycle phase.
    pub phase: PhaseEntity,
    /// Player allowed to start the match.
    pub host_id: Uuid,
    /// Players in join order.
    #[validate(nested)]
    pub players: Vec<PlayerEntity>,
    /// Eliminations in the order they happened.
    #[serde(default)]
    pub kill_log: Vec<KillEventEntity>,
    /// Settings fixed at creation.
    pub config: GameConfigEntity,
    /// Set when the match starts (ms since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    /// Creation time (ms since epoch).
    pub created_at: u64,
    /// Refreshed by the store on every write (ms since epoch).
    pub last_updated: u64,
    /// Number of writes applied by the store.
    #[serde(default)]
    pub revision: u64,
}

/// Shallow set of fields merged into a stored game by `update`.
///
/// Absent fields are left untouched; present collections replace the stored
/// collection wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GamePatchEntity {
    /// New phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PhaseEntity>,
    /// Full replacement player list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub players: Option<Vec<PlayerEntity>>,
    /// Full replacement kill log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_log: Option<Vec<KillEventEntity>>,
    /// Match start time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
}

impl GameEntity {
    /// Merge `patch` into the document and stamp the write.
    ///
    /// `last_updated` strictly increases even when the wall clock does not.
    pub fn apply_patch(&mut self, patch: GamePatchEntity, now: u64) {
        let GamePatchEntity {
            phase,
            players,
            kill_log,
            start_time,
        } = patch;

        if let Some(phase) = phase {
            self.phase = phase;
        }
        if let Some(players) = players {
            self.players = players;
        }
        if let Some(kill_log) = kill_log {
            self.kill_log = kill_log;
        }
        if start_time.is_some() {
            self.start_time = start_time;
        }
        self.stamp(now);
    }

    /// Refresh `last_updated` and bump the revision counter.
    pub fn stamp(&mut self, now: u64) {
        self.last_updated = now.max(self.last_updated + 1);
        self.revision += 1;
    }
}

impl GamePatchEntity {
    /// Whether the patch mentions no field at all.
    pub fn is_empty(&self) -> bool {
        self.phase.is_none()
            && self.players.is_none()
            && self.kill_log.is_none()
            && self.start_time.is_none()
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    u64::try_from(nanos / 1_000_000).unwrap_or_default()
}
