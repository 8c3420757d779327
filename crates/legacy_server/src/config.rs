//! Configuration management for the Legacy server.
//!
//! Settings are loaded from a TOML file, with a default file written on first
//! start, then overridden from the command line and validated.

use legacy_cache::CacheOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

fn default_tick_interval() -> u64 {
    50 // 20 ticks per second
}

fn default_feed_capacity() -> usize {
    1024
}

fn default_cooldown_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub regions: RegionSettings,
    #[serde(default)]
    pub map: MapSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Name of this instance, shown in logs
    pub instance_name: String,
    /// Whether this instance performs master-only duties
    #[serde(default)]
    pub master: bool,
    /// Tick interval in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub database: String,
    /// Events buffered per collection feed before slow consumers lag
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Load every cache before the tick loop starts
    #[serde(default = "default_true")]
    pub load_on_startup: bool,
    /// Rebuild a cache from the store when its feed lags
    #[serde(default = "default_true")]
    pub resync_on_lag: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSettings {
    /// How long repeated "can't build here" feedback is suppressed
    #[serde(default = "default_cooldown_ms")]
    pub failed_access_cooldown_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    pub json_format: bool,
    /// Optional file path for log output (None means stdout only)
    pub file_path: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            instance_name: "master".to_string(),
            master: true,
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database: "legacy".to_string(),
            feed_capacity: default_feed_capacity(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            load_on_startup: true,
            resync_on_lag: true,
        }
    }
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            failed_access_cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl Default for MapSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file_path: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`, writing the default configuration
    /// there first if the file does not exist.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            resync_on_lag: self.cache.resync_on_lag,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.server.tick_interval_ms)
    }

    pub fn failed_access_cooldown(&self) -> Duration {
        Duration::from_millis(self.regions.failed_access_cooldown_ms)
    }

    /// Validates the configuration settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.instance_name.trim().is_empty() {
            return Err("Instance name cannot be empty".to_string());
        }

        if self.server.tick_interval_ms == 0 {
            return Err("server.tick_interval_ms must be greater than 0".to_string());
        }

        if self.store.database.trim().is_empty() {
            return Err("Database name cannot be empty".to_string());
        }

        if self.store.feed_capacity == 0 {
            return Err("store.feed_capacity must be greater than 0".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.instance_name, "master");
        assert!(config.server.master);
        assert_eq!(config.server.tick_interval_ms, 50);
        assert_eq!(config.store.database, "legacy");
        assert_eq!(config.store.feed_capacity, 1024);
        assert!(config.cache.load_on_startup);
        assert!(config.cache.resync_on_lag);
        assert_eq!(config.regions.failed_access_cooldown_ms, 5000);
        assert!(config.map.enabled);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.logging.file_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.instance_name, "master");
        assert!(path.exists());

        // the written file loads back to the same settings
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.store.feed_capacity, config.store.feed_capacity);
        assert_eq!(reloaded.logging.level, config.logging.level);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
instance_name = "survival-2"
tick_interval_ms = 25

[store]
database = "legacy-test"
feed_capacity = 64

[cache]
resync_on_lag = false

[regions]
failed_access_cooldown_ms = 1500

[map]
enabled = false

[logging]
level = "debug"
json_format = true
"#;
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(config.server.instance_name, "survival-2");
        assert!(!config.server.master);
        assert_eq!(config.tick_interval(), Duration::from_millis(25));
        assert_eq!(config.store.database, "legacy-test");
        assert_eq!(config.store.feed_capacity, 64);
        assert!(config.cache.load_on_startup);
        assert!(!config.cache_options().resync_on_lag);
        assert_eq!(config.failed_access_cooldown(), Duration::from_millis(1500));
        assert!(!config.map.enabled);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_missing_sections_use_defaults() {
        let toml_content = r#"
[server]
instance_name = "creative"

[logging]
level = "warn"
json_format = false
"#;
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(config.server.tick_interval_ms, 50);
        assert_eq!(config.store.database, "legacy");
        assert!(config.map.enabled);
        assert_eq!(config.regions.failed_access_cooldown_ms, 5000);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), "[server\ninstance_name = 3").await.unwrap();
        assert!(AppConfig::load_from_file(file.path()).await.is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.tick_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.store.feed_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.instance_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_log_levels() {
        let mut config = AppConfig::default();
        for level in ["trace", "debug", "info", "warn", "error"] {
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "{level} should be accepted");
        }
    }
}
