/// Application configuration, loaded from a JSON file
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const CONFIG_PATH_ENV: &str = "SEATWATCH_CONFIG";
pub const ADMIN_TOKEN_ENV: &str = "SEATWATCH_ADMIN_TOKEN";

const DEFAULT_FEED_URL: &str = "https://usis-cdn.eniamza.com/connect.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io { path: String, source: io::Error },

    #[error("Failed to parse config file {path}: {source}")]
    Parse { path: String, source: JsonError },

    #[error("Invalid feed URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed_url: String,
    pub database_path: String,
    pub bind_address: String,
    pub port: u16,
    pub sync_interval_secs: u64,
    pub reminder_interval_secs: u64,
    pub reactive_cooldown_secs: u64,
    pub write_chunk_size: usize,
    pub broadcast_capacity: usize,
    pub feed_timeout_secs: Option<u64>,
    pub admin_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            database_path: "seatwatch.sqlite".to_string(),
            bind_address: "127.0.0.1".to_string(),
            port: 3000,
            sync_interval_secs: 30,
            reminder_interval_secs: 60,
            reactive_cooldown_secs: 270,
            write_chunk_size: 100,
            broadcast_capacity: 100,
            feed_timeout_secs: None,
            admin_token: None,
        }
    }
}

impl AppConfig {
    /// Picks the config path: the first CLI argument, else
    /// `SEATWATCH_CONFIG`, else `config.json`.
    pub fn resolve_path(cli_arg: Option<String>) -> PathBuf {
        cli_arg
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
            .into()
    }

    /// Loads and validates the config at `path`, then applies environment
    /// overrides. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        if let Ok(token) = std::env::var(ADMIN_TOKEN_ENV) {
            config.admin_token = Some(token);
        }

        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, JsonError> {
        serde_json::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.feed_url).map_err(|source| ConfigError::InvalidUrl {
            url: self.feed_url.clone(),
            source,
        })?;

        if self.sync_interval_secs == 0 || self.reminder_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "timer intervals must be at least one second".to_string(),
            ));
        }
        if self.write_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "write_chunk_size must be positive".to_string(),
            ));
        }
        if self.admin_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid("admin_token must not be blank".to_string()));
        }

        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_secs)
    }

    pub fn reactive_cooldown(&self) -> Duration {
        Duration::from_secs(self.reactive_cooldown_secs)
    }

    pub fn feed_timeout(&self) -> Option<Duration> {
        self.feed_timeout_secs.map(Duration::from_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_json(r#"{"port": 8080, "admin_token": "secret"}"#).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.admin_token.as_deref(), Some("secret"));
        assert_eq!(config.sync_interval(), Duration::from_secs(30));
        assert_eq!(config.reminder_interval(), Duration::from_secs(60));
        assert_eq!(config.reactive_cooldown(), Duration::from_secs(270));
        assert_eq!(config.write_chunk_size, 100);
        assert!(config.feed_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config = AppConfig::from_json(r#"{"feed_url": "not a url"}"#).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));

        let config = AppConfig::from_json(r#"{"sync_interval_secs": 0}"#).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        assert!(AppConfig::from_json(r#"{"port": "eighty"}"#).is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/seatwatch/config.json")).unwrap();
        assert_eq!(config.feed_url, DEFAULT_FEED_URL);
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
    }
}
