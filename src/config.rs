use crate::error::{FeedError, Result};
use crate::feed::RefreshSchedule;
use chrono::{FixedOffset, NaiveTime};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub storage: StorageConfig,
    pub refresh: RefreshConfig,
    pub notifications: NotificationConfig,
    /// Raw venue spelling to canonical name, merged over the built-in table
    pub venue_aliases: HashMap<String, String>,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3001 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub url: Option<String>,
    pub file: Option<PathBuf>,
    pub timeout_seconds: u64,
    pub upcoming_only: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            file: None,
            timeout_seconds: 120,
            upcoming_only: true,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/partyfinder.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub hour: u32,
    pub minute: u32,
    pub utc_offset_minutes: i32,
    pub sweep_interval_seconds: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            hour: 10,
            minute: 0,
            utc_offset_minutes: 60,
            sweep_interval_seconds: 900,
        }
    }
}

impl RefreshConfig {
    /// The fixed reference zone every "today" is computed in
    pub fn zone(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            FeedError::Config(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn schedule(&self) -> Result<RefreshSchedule> {
        let at = NaiveTime::from_hms_opt(self.hour, self.minute, 0).ok_or_else(|| {
            FeedError::Config(format!("invalid refresh time {}:{}", self.hour, self.minute))
        })?;
        Ok(RefreshSchedule::new(at, self.zone()?))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub expo_push_url: Option<String>,
    pub device_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub port: Option<u16>,
}

impl Config {
    /// Read `path` if it exists (defaults otherwise), then apply
    /// `PARTYFINDER_*` overrides from the environment and `.env`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                FeedError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        dotenv::dotenv().ok();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = var("PARTYFINDER_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| FeedError::Config(format!("PARTYFINDER_PORT is not a port: {}", port)))?;
        }
        if let Some(url) = var("PARTYFINDER_UPSTREAM_URL") {
            self.upstream.url = Some(url);
        }
        if let Some(file) = var("PARTYFINDER_UPSTREAM_FILE") {
            self.upstream.file = Some(PathBuf::from(file));
        }
        if let Some(db) = var("PARTYFINDER_DB_PATH") {
            self.storage.path = PathBuf::from(db);
        }
        if let Some(dir) = var("PARTYFINDER_LOG_DIR") {
            self.logging.dir = PathBuf::from(dir);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gets_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.upstream.timeout_seconds, 120);
        assert!(config.upstream.upcoming_only);
        assert_eq!(config.refresh.hour, 10);
        assert_eq!(config.refresh.zone().unwrap().local_minus_utc(), 3600);
        assert_eq!(config.storage.path, PathBuf::from("data/partyfinder.db"));
    }

    #[test]
    fn sections_and_aliases_parse() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8080

            [upstream]
            url = "http://localhost:9000/events"

            [refresh]
            hour = 9
            minute = 30

            [venue_aliases]
            "SALA X" = "Sala X"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.upstream.url.as_deref(), Some("http://localhost:9000/events"));
        assert_eq!(config.refresh.minute, 30);
        assert_eq!(config.venue_aliases.get("SALA X").map(String::as_str), Some("Sala X"));
    }

    #[test]
    fn env_overrides_win() {
        let mut config = Config::default();
        config
            .apply_overrides(|key| match key {
                "PARTYFINDER_PORT" => Some("4000".to_string()),
                "PARTYFINDER_DB_PATH" => Some("/tmp/x.db".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.storage.path, PathBuf::from("/tmp/x.db"));

        let bad = config.apply_overrides(|key| (key == "PARTYFINDER_PORT").then(|| "abc".to_string()));
        assert!(bad.is_err());
    }

    #[test]
    fn invalid_refresh_time_is_rejected() {
        let refresh = RefreshConfig {
            hour: 25,
            ..RefreshConfig::default()
        };
        assert!(refresh.schedule().is_err());
    }
}
