//! Durable device session: identity, active game, custom avatar and history,
//! each stored under its own key so one corrupt value never takes the others
//! down.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    services::ledger::{HistoryEntry, HistoryLedger},
    state::game::{GameCode, Identity, PlayerId},
};

/// Key holding the player's identity as JSON.
pub const IDENTITY_KEY: &str = "killer_user";
/// Key holding the code of the game in progress.
pub const GAME_KEY: &str = "killer_game_id";
/// Key holding a captured avatar image.
pub const AVATAR_KEY: &str = "killer_custom_avatar";
/// Key holding the history ledger as a JSON array.
pub const HISTORY_KEY: &str = "killer_history";

/// Failures of the session storage.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backing storage could not be read or written.
    #[error("failed to access session key `{key}`")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    /// A value could not be serialized.
    #[error("failed to encode session key `{key}`")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// String key/value storage that survives restarts.
pub trait LocalStorage: Send + Sync {
    /// Stored value, `None` when the key was never set.
    fn get(&self, key: &str) -> SessionResult<Option<String>>;
    /// Replace the value under `key`.
    fn set(&self, key: &str, value: &str) -> SessionResult<()>;
    /// Forget `key`; removing a missing key succeeds.
    fn remove(&self, key: &str) -> SessionResult<()>;
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir`, created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the key files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

fn io_error(key: &str, source: io::Error) -> SessionError {
    SessionError::Io {
        key: key.to_string(),
        source,
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(key, err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        fs::create_dir_all(&self.dir).map_err(|err| io_error(key, err))?;
        fs::write(self.path(key), value).map_err(|err| io_error(key, err))
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(key, err)),
        }
    }
}

/// Process-local storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get(&self, key: &str) -> SessionResult<Option<String>> {
        Ok(self.values.get(key).map(|value| value.clone()))
    }

    fn set(&self, key: &str, value: &str) -> SessionResult<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> SessionResult<()> {
        self.values.remove(key);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredIdentity {
    id: Uuid,
    name: String,
    #[serde(default)]
    avatar: String,
}

impl From<&Identity> for StoredIdentity {
    fn from(value: &Identity) -> Self {
        Self {
            id: value.id.0,
            name: value.name.clone(),
            avatar: value.avatar.clone(),
        }
    }
}

impl From<StoredIdentity> for Identity {
    fn from(value: StoredIdentity) -> Self {
        Self {
            id: PlayerId(value.id),
            name: value.name,
            avatar: value.avatar,
        }
    }
}

/// Everything a device remembers between launches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Who this device plays as.
    pub identity: Option<Identity>,
    /// Game to reconnect to.
    pub game: Option<GameCode>,
    /// Avatar image chosen by the player, if any.
    pub custom_avatar: Option<String>,
    /// Finished games, most recent first.
    pub history: HistoryLedger,
}

impl Session {
    /// Identity and game code are both known: the device should reconnect.
    pub fn resumable(&self) -> Option<(&Identity, &GameCode)> {
        Some((self.identity.as_ref()?, self.game.as_ref()?))
    }
}

/// Reads and writes the session keys of one device.
#[derive(Clone)]
pub struct SessionManager {
    storage: Arc<dyn LocalStorage>,
    history_limit: usize,
}

impl SessionManager {
    /// Manager keeping at most `history_limit` history entries (at least one).
    pub fn new(storage: Arc<dyn LocalStorage>, history_limit: usize) -> Self {
        Self {
            storage,
            history_limit: history_limit.max(1),
        }
    }

    /// Manager using the history cap from `config`.
    pub fn from_config(storage: Arc<dyn LocalStorage>, config: &AppConfig) -> Self {
        Self::new(storage, config.history_limit)
    }

    /// Load every key independently. Unreadable values are discarded.
    pub fn restore(&self) -> Session {
        let identity = self
            .read_key(IDENTITY_KEY, |raw| {
                serde_json::from_str::<StoredIdentity>(raw)
                    .map(Identity::from)
                    .map_err(|err| err.to_string())
            });
        let game = self.read_key(GAME_KEY, |raw| {
            GameCode::parse(raw).map_err(|err| err.to_string())
        });
        let custom_avatar = self.read_key(AVATAR_KEY, |raw| Ok(raw.to_string()));
        let history = self
            .read_key(HISTORY_KEY, |raw| {
                serde_json::from_str::<Vec<HistoryEntry>>(raw).map_err(|err| err.to_string())
            })
            .map(|entries| HistoryLedger::from_entries(entries, self.history_limit))
            .unwrap_or_else(|| HistoryLedger::new(self.history_limit));

        debug!(
            identity = identity.is_some(),
            game = game.is_some(),
            history = history.entries().len(),
            "session restored"
        );
        Session {
            identity,
            game,
            custom_avatar,
            history,
        }
    }

    /// Persist the device identity.
    pub fn save_identity(&self, identity: &Identity) -> SessionResult<()> {
        let raw = serde_json::to_string(&StoredIdentity::from(identity)).map_err(|source| {
            SessionError::Encode {
                key: IDENTITY_KEY.to_string(),
                source,
            }
        })?;
        self.storage.set(IDENTITY_KEY, &raw)
    }

    /// Remember the game to reconnect to.
    pub fn set_game(&self, code: &GameCode) -> SessionResult<()> {
        self.storage.set(GAME_KEY, code.as_str())
    }

    /// Forget the active game; identity, avatar and history stay.
    pub fn clear_game(&self) -> SessionResult<()> {
        self.storage.remove(GAME_KEY)
    }

    /// Store or clear the captured avatar.
    pub fn set_custom_avatar(&self, avatar: Option<&str>) -> SessionResult<()> {
        match avatar {
            Some(avatar) => self.storage.set(AVATAR_KEY, avatar),
            None => self.storage.remove(AVATAR_KEY),
        }
    }

    /// Forget identity and game; history and avatar stay.
    pub fn sign_out(&self) -> SessionResult<()> {
        self.storage.remove(IDENTITY_KEY)?;
        self.storage.remove(GAME_KEY)
    }

    /// Replace the stored history.
    pub fn save_history(&self, ledger: &HistoryLedger) -> SessionResult<()> {
        let raw = serde_json::to_string(ledger.entries()).map_err(|source| SessionError::Encode {
            key: HISTORY_KEY.to_string(),
            source,
        })?;
        self.storage.set(HISTORY_KEY, &raw)
    }

    /// Add an entry to the persisted ledger. Returns whether it was new.
    pub fn record_outcome(&self, entry: HistoryEntry) -> SessionResult<bool> {
        let mut ledger = self.restore().history;
        if !ledger.record_outcome(entry) {
            return Ok(false);
        }
        self.save_history(&ledger)?;
        Ok(true)
    }

    fn read_key<T>(&self, key: &str, parse: impl FnOnce(&str) -> Result<T, String>) -> Option<T> {
        let raw = match self.storage.get(key) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key, error = %err, "session key unreadable");
                return None;
            }
        };
        match parse(&raw) {
            Ok(value) => Some(value),
            Err(reason) => {
                warn!(key, reason = %reason, "discarding corrupt session key");
                if let Err(err) = self.storage.remove(key) {
                    warn!(key, error = %err, "failed to remove corrupt session key");
                }
                None
            }
        }
    }
}
