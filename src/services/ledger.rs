//! Capped, per-device record of finished games.

use serde::{Deserialize, Serialize};

use crate::state::{
    game::{Game, PlayerId, PlayerStatus},
    rules::compute_standing,
};

/// Default number of entries kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// How a finished game ended for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    /// Top of the final standings.
    Winner,
    /// Alive at the end without topping the standings.
    Survived,
    /// Taken out before the end.
    Eliminated,
}

/// One finished game as remembered by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Code of the finished game.
    pub game_id: String,
    /// Display name of the game.
    pub name: String,
    /// Milliseconds since the Unix epoch.
    pub date: u64,
    /// How the game ended for the player.
    pub result: GameOutcome,
    /// Eliminations the player scored.
    pub kills: u32,
    /// Final score of the player.
    pub score: u32,
}

impl HistoryEntry {
    /// Entry for `player` in `game`, or `None` when they did not take part.
    pub fn for_player(game: &Game, player: PlayerId, date: u64) -> Option<Self> {
        let record = game.player(player)?;
        Some(Self {
            game_id: game.code.to_string(),
            name: game.name.clone(),
            date,
            result: outcome_for(game, player)?,
            kills: record.kill_count,
            score: record.score,
        })
    }
}

/// Most recent first, at most `limit` entries, one per game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryLedger {
    entries: Vec<HistoryEntry>,
    limit: usize,
}

impl HistoryLedger {
    /// Empty ledger keeping at most `limit` entries (at least one).
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Rebuild a ledger from persisted entries, enforcing the cap and
    /// dropping repeated games.
    pub fn from_entries(entries: Vec<HistoryEntry>, limit: usize) -> Self {
        let mut ledger = Self::new(limit);
        for entry in entries {
            if ledger.entries.len() == ledger.limit {
                break;
            }
            if !ledger.contains(&entry.game_id) {
                ledger.entries.push(entry);
            }
        }
        ledger
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Maximum number of entries kept.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether `game_id` is already recorded.
    pub fn contains(&self, game_id: &str) -> bool {
        self.entries.iter().any(|entry| entry.game_id == game_id)
    }

    /// Prepend `entry` unless its game is already recorded.
    pub fn record_outcome(&mut self, entry: HistoryEntry) -> bool {
        if self.contains(&entry.game_id) {
            return false;
        }
        self.entries.insert(0, entry);
        self.entries.truncate(self.limit);
        true
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

/// Result of `player` in `game`: the top of the standings wins, everyone
/// else survived or was eliminated.
pub fn outcome_for(game: &Game, player: PlayerId) -> Option<GameOutcome> {
    let record = game.player(player)?;
    let leader = compute_standing(game).first().map(|leader| leader.id);
    let outcome = if leader == Some(player) {
        GameOutcome::Winner
    } else if record.status == PlayerStatus::Eliminated {
        GameOutcome::Eliminated
    } else {
        GameOutcome::Survived
    };
    Some(outcome)
}
