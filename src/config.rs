//! Application-level configuration loading: history cap, expiry policy, SSE
//! buffering and the fallback mission catalog.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::{dao::models::MissionEntity, services::missions::MissionCatalog};

/// Default location on disk where the relay looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "KILLER_PARTY_CONFIG_PATH";

const DEFAULT_HISTORY_LIMIT: usize = 20;
const DEFAULT_GAME_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_EXPIRY_SWEEP: Duration = Duration::from_secs(10 * 60);
const DEFAULT_SSE_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Maximum number of entries kept in a player's history ledger.
    pub history_limit: usize,
    /// Games created longer ago than this are swept.
    pub game_ttl: Duration,
    /// Interval between two expiry sweeps.
    pub expiry_sweep: Duration,
    /// Per-game feed buffer before slow subscribers are resynchronized.
    pub sse_capacity: usize,
    catalog: MissionCatalog,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration stored at `path`.
    ///
    /// Unreadable or malformed files yield the defaults with a logged reason.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        missions = app_config.catalog.len(),
                        history_limit = app_config.history_limit,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Missions used when the content provider is off or comes up short.
    pub fn catalog(&self) -> &MissionCatalog {
        &self.catalog
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            game_ttl: DEFAULT_GAME_TTL,
            expiry_sweep: DEFAULT_EXPIRY_SWEEP,
            sse_capacity: DEFAULT_SSE_CAPACITY,
            catalog: MissionCatalog::default(),
        }
    }
}

fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    history_limit: usize,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "game_ttl_secs")]
    game_ttl: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "expiry_sweep_secs")]
    expiry_sweep: Duration,
    sse_capacity: usize,
    missions: Option<Vec<MissionEntity>>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            game_ttl: DEFAULT_GAME_TTL,
            expiry_sweep: DEFAULT_EXPIRY_SWEEP,
            sse_capacity: DEFAULT_SSE_CAPACITY,
            missions: None,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let catalog = match value.missions {
            Some(missions) if !missions.is_empty() => {
                MissionCatalog::new(missions.into_iter().map(Into::into).collect())
            }
            Some(_) => {
                warn!("configured mission catalog is empty; keeping the built-in one");
                MissionCatalog::default()
            }
            None => MissionCatalog::default(),
        };
        Self {
            history_limit: value.history_limit.max(1),
            game_ttl: value.game_ttl,
            expiry_sweep: value.expiry_sweep.max(Duration::from_secs(1)),
            sse_capacity: value.sse_capacity.max(1),
            catalog,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let raw: RawConfig = serde_json::from_str(r#"{ "history_limit": 5 }"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.game_ttl, DEFAULT_GAME_TTL);
        assert_eq!(config.catalog().len(), MissionCatalog::default().len());
    }

    #[test]
    fn durations_are_read_as_seconds() {
        let raw: RawConfig =
            serde_json::from_str(r#"{ "game_ttl_secs": 60, "expiry_sweep_secs": 0 }"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.game_ttl, Duration::from_secs(60));
        assert_eq!(config.expiry_sweep, Duration::from_secs(1));
    }

    #[test]
    fn custom_catalog_replaces_builtin_missions() {
        let raw: RawConfig = serde_json::from_str(
            r#"{ "missions": [
                { "id": "x", "description": "Wink twice", "difficulty": 7, "category": "Stealth" }
            ] }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.catalog().len(), 1);
        assert_eq!(config.catalog().missions()[0].difficulty.tier(), 3);
    }
}
