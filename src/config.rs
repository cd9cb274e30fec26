//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! surf-watch.toml file. It centralizes provider endpoints, notification sink
//! constants and storage locations. User preferences that change at runtime
//! (units, location, schedules) live in the settings store instead.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "surf-watch.toml";

/// Application configuration loaded from surf-watch.toml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Forecast and geocoding providers
    pub providers: ProviderConfig,
    /// Notification sink constants
    pub notify: NotifyConfig,
    /// Settings store and forecast cache
    pub storage: StorageConfig,
}

/// Forecast and geocoding provider endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub weather_url: String,
    pub marine_url: String,
    pub geocoding_url: String,
    /// Maximum number of geocoding candidates per search
    pub geocoding_count: u8,
    /// Days of hourly data requested per fetch
    pub forecast_days: u8,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            weather_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            marine_url: "https://marine-api.open-meteo.com/v1/marine".to_string(),
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
            geocoding_count: 10,
            forecast_days: 2,
            timeout_secs: 20,
        }
    }
}

/// Fixed values used when building notification requests
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Pub/sub service base URL; the topic is appended as a path segment
    pub pubsub_base_url: String,
    /// Pub/sub `Title` header
    pub pubsub_title: String,
    /// Pub/sub `Priority` header
    pub pubsub_priority: String,
    /// Pub/sub `Tags` header
    pub pubsub_tags: String,
    /// Webhook display name
    pub webhook_username: String,
    /// Webhook avatar image
    pub webhook_avatar_url: Option<String>,
    /// Embed thumbnail image
    pub webhook_thumbnail_url: Option<String>,
    /// Embed accent color (0xRRGGBB)
    pub webhook_color: u32,
    /// User-Agent sent with every outgoing request
    pub user_agent: String,
    /// Schedule polling interval in seconds
    pub poll_interval_secs: u64,
    /// Forecast refresh interval while watching, in minutes
    pub refresh_interval_minutes: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            pubsub_base_url: "https://ntfy.sh".to_string(),
            pubsub_title: "Surf Watch".to_string(),
            pubsub_priority: "default".to_string(),
            pubsub_tags: "ocean,wind".to_string(),
            webhook_username: "Surf Watch".to_string(),
            webhook_avatar_url: None,
            webhook_thumbnail_url: None,
            webhook_color: 0x1E90FF,
            user_agent: concat!("surf-watch/", env!("CARGO_PKG_VERSION")).to_string(),
            poll_interval_secs: 60,
            refresh_interval_minutes: 30,
        }
    }
}

/// Where settings and cached forecasts are kept
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON file per settings domain
    pub dir: PathBuf,
    /// Forecast cache TTL in minutes
    pub cache_ttl_minutes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let dir = std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".surf-watch"))
            .unwrap_or_else(|| PathBuf::from(".surf-watch"));
        Self {
            dir,
            cache_ttl_minutes: 30,
        }
    }
}

impl StorageConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes * 60)
    }
}

impl Config {
    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid config file format in {}: {}", path.display(), e);
                    warn!("Using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.providers.geocoding_count, 10);
        assert_eq!(config.notify.pubsub_base_url, "https://ntfy.sh");
        assert_eq!(config.notify.poll_interval_secs, 60);
        assert_eq!(config.storage.cache_ttl_minutes, 30);
        assert_eq!(config.storage.cache_ttl(), Duration::from_secs(1800));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.providers.weather_url, parsed.providers.weather_url);
        assert_eq!(config.notify.user_agent, parsed.notify.user_agent);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: Config = toml::from_str(
            r#"
[notify]
pubsub_base_url = "https://push.example.org"

[storage]
cache_ttl_minutes = 5
"#,
        )
        .unwrap();
        assert_eq!(parsed.notify.pubsub_base_url, "https://push.example.org");
        assert_eq!(parsed.notify.pubsub_title, "Surf Watch");
        assert_eq!(parsed.storage.cache_ttl_minutes, 5);
        assert_eq!(parsed.providers.forecast_days, 2);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.providers.geocoding_count, 10);
    }

    #[test]
    fn test_load_invalid_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "providers = 12").unwrap();
        let config = Config::load_from_path(&path);
        assert_eq!(config.notify.poll_interval_secs, 60);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut config = Config::default();
        config.notify.pubsub_tags = "surf".to_string();
        config.save(&path).unwrap();
        assert_eq!(Config::load_from_path(&path).notify.pubsub_tags, "surf");
    }
}
