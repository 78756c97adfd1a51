//! Client configuration loading: gameplay constants shared by the entity
//! builder and the sync throttle.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the client looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/client.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "VERSECLASH_CONFIG_PATH";

/// Immutable runtime configuration shared across the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Game score at which a player wins the whole game.
    pub winning_score: i64,
    /// Upper bound for synthesized game names.
    pub max_game_name_length: usize,
    /// Minimum number of seconds between two full game-list syncs.
    pub sync_min_interval_secs: i64,
}

impl ClientConfig {
    /// Load the client configuration from disk, falling back to the baked-in
    /// defaults when the file is absent or malformed.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded client config");
                    config
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
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            winning_score: 10,
            max_game_name_length: 26,
            sync_min_interval_secs: 60,
        }
    }
}

/// JSON representation of the configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    winning_score: Option<i64>,
    #[serde(default)]
    max_game_name_length: Option<usize>,
    #[serde(default)]
    sync_min_interval_secs: Option<i64>,
}

impl From<RawConfig> for ClientConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = ClientConfig::default();
        Self {
            winning_score: value.winning_score.unwrap_or(defaults.winning_score),
            max_game_name_length: value
                .max_game_name_length
                .unwrap_or(defaults.max_game_name_length),
            sync_min_interval_secs: value
                .sync_min_interval_secs
                .unwrap_or(defaults.sync_min_interval_secs),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
