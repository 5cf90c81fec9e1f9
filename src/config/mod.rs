//! Application configuration
//!
//! `Config.yml` in the platform config directory holds the game location,
//! directory overrides, the current rule set and the network and session
//! settings. A missing file means defaults. A few `RANDOMIZER_*` environment
//! variables override the file.

use crate::autosave::DEFAULT_REPLAY_FILE_FORMAT;
use crate::fetch::RetryPolicy;
use crate::rules::RandomizerRules;
use crate::session::SessionSettings;
use crate::storage::write_atomic;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Configuration file name
pub const CONFIG_FILE: &str = "Config.yml";

pub const ENV_GAME_DIRECTORY: &str = "RANDOMIZER_GAME_DIRECTORY";
pub const ENV_LOG_LEVEL: &str = "RANDOMIZER_LOG_LEVEL";
pub const ENV_DATA_DIRECTORY: &str = "RANDOMIZER_DATA_DIRECTORY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Could not determine home directory")]
    NoHomeDirectory,

    #[error("Configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("com", "tmx-randomizer", "tmx-randomizer").ok_or(ConfigError::NoHomeDirectory)
}

/// Default location of `Config.yml`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(project_dirs()?.config_dir().join(CONFIG_FILE))
}

/// Network settings of the map fetcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchSettings {
    #[serde(flatten)]
    pub retry: RetryPolicy,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("tmx-randomizer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_replay_file_format() -> String {
    DEFAULT_REPLAY_FILE_FORMAT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomizerConfig {
    /// The game's user data directory (the one containing `Tracks`)
    #[serde(default)]
    pub game_directory: Option<PathBuf>,

    #[serde(default)]
    pub autosaves_directory: Option<PathBuf>,

    #[serde(default)]
    pub downloaded_directory: Option<PathBuf>,

    /// Root for `Sessions` and `Presets`
    #[serde(default)]
    pub data_directory: Option<PathBuf>,

    #[serde(default = "default_replay_file_format")]
    pub replay_file_format: String,

    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub rules: RandomizerRules,

    #[serde(default)]
    pub fetch: FetchSettings,

    #[serde(default)]
    pub session: SessionSettings,
}

impl Default for RandomizerConfig {
    fn default() -> Self {
        Self {
            game_directory: None,
            autosaves_directory: None,
            downloaded_directory: None,
            data_directory: None,
            replay_file_format: default_replay_file_format(),
            log_level: None,
            rules: RandomizerRules::default(),
            fetch: FetchSettings::default(),
            session: SessionSettings::default(),
        }
    }
}

impl RandomizerConfig {
    /// Load from the default location and apply environment overrides
    pub async fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&default_config_path()?).await?;
        config.merge_env_vars(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a configuration file; a missing or empty file yields defaults
    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !fs::try_exists(path).await? {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).await?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Apply `RANDOMIZER_*` overrides from a variable lookup
    pub fn merge_env_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_GAME_DIRECTORY).filter(|v| !v.is_empty()) {
            self.game_directory = Some(PathBuf::from(dir));
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
            self.log_level = Some(level);
        }
        if let Some(dir) = lookup(ENV_DATA_DIRECTORY).filter(|v| !v.is_empty()) {
            self.data_directory = Some(PathBuf::from(dir));
        }
    }

    /// Write the configuration atomically, creating parent directories
    pub async fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_yaml::to_string(self)?;
        write_atomic(path, content.as_bytes())
            .await
            .map_err(|e| ConfigError::Io(std::io::Error::other(e.to_string())))
    }

    pub fn autosaves_dir(&self) -> Option<PathBuf> {
        self.autosaves_directory.clone().or_else(|| {
            self.game_directory
                .as_ref()
                .map(|game| game.join("Tracks").join("Replays").join("Autosaves"))
        })
    }

    pub fn downloaded_dir(&self) -> Option<PathBuf> {
        self.downloaded_directory.clone().or_else(|| {
            self.game_directory.as_ref().map(|game| {
                game.join("Tracks")
                    .join("Challenges")
                    .join("Downloaded")
                    .join("_RandomizerTMX")
            })
        })
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().to_path_buf()),
        }
    }

    pub fn sessions_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("Sessions"))
    }

    pub fn presets_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.data_dir()?.join("Presets"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SkipBudgetPolicy;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = RandomizerConfig::load_from(&temp.path().join(CONFIG_FILE))
            .await
            .unwrap();
        assert_eq!(config, RandomizerConfig::default());
        assert_eq!(config.replay_file_format, DEFAULT_REPLAY_FILE_FORMAT);
        assert_eq!(config.fetch.retry.attempts, 3);
    }

    #[tokio::test]
    async fn test_partial_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "game_directory: /games/tm\n\
             rules:\n  time_limit: 30m\n\
             fetch:\n  attempts: 5\n  request_timeout: 10s\n\
             session:\n  skip_budget_policy: free_only\n",
        )
        .unwrap();

        let config = RandomizerConfig::load_from(&path).await.unwrap();
        assert_eq!(config.game_directory, Some(PathBuf::from("/games/tm")));
        assert_eq!(config.rules.time_limit, Duration::from_secs(30 * 60));
        assert_eq!(config.fetch.retry.attempts, 5);
        assert_eq!(config.fetch.retry.initial_delay, Duration::from_millis(500));
        assert_eq!(config.fetch.request_timeout, Duration::from_secs(10));
        assert_eq!(config.session.skip_budget_policy, SkipBudgetPolicy::FreeOnly);
        assert_eq!(
            config.autosaves_dir(),
            Some(PathBuf::from("/games/tm/Tracks/Replays/Autosaves"))
        );
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        std::fs::write(&path, "rules: [not, a, map]\n").unwrap();
        assert!(matches!(
            RandomizerConfig::load_from(&path).await,
            Err(ConfigError::Yaml(_))
        ));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join(CONFIG_FILE);
        let mut config = RandomizerConfig {
            game_directory: Some(PathBuf::from("/games/tm")),
            ..RandomizerConfig::default()
        };
        config.rules.request_rules.free_skip_limit = Some(2);
        config.save_to(&path).await.unwrap();

        assert_eq!(RandomizerConfig::load_from(&path).await.unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_GAME_DIRECTORY, "/env/game"),
            (ENV_LOG_LEVEL, "debug"),
            (ENV_DATA_DIRECTORY, ""),
        ]
        .into();
        let mut config = RandomizerConfig {
            data_directory: Some(PathBuf::from("/data")),
            ..RandomizerConfig::default()
        };
        config.merge_env_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.game_directory, Some(PathBuf::from("/env/game")));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.data_directory, Some(PathBuf::from("/data")));
        assert_eq!(
            config.sessions_dir().unwrap(),
            PathBuf::from("/data/Sessions")
        );
        assert_eq!(config.presets_dir().unwrap(), PathBuf::from("/data/Presets"));
    }

    #[test]
    fn test_directory_overrides_win() {
        let config = RandomizerConfig {
            game_directory: Some(PathBuf::from("/games/tm")),
            downloaded_directory: Some(PathBuf::from("/maps")),
            ..RandomizerConfig::default()
        };
        assert_eq!(config.downloaded_dir(), Some(PathBuf::from("/maps")));
        assert!(RandomizerConfig::default().autosaves_dir().is_none());
    }
}
