//! Configuration loading
//!
//! Resolution order per key: environment variable > TOML config file >
//! compiled default. All values land in a plain typed struct; services
//! read fields directly instead of doing dynamic lookups.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

/// Raw TOML configuration file contents (all keys optional)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub radar_service_url: Option<String>,
    pub military_only: Option<bool>,
    pub retention_minutes: Option<i64>,
    pub data_folder: Option<String>,
    pub database_path: Option<String>,
    pub update_interval_secs: Option<u64>,
    pub crawl_interval_secs: Option<u64>,
    pub crawler_batch_size: Option<u32>,
    pub crawler_max_attempts: Option<u32>,
    pub service_error_reset_hours: Option<i64>,
    pub staleness_days: Option<i64>,
    pub incomplete_staleness_days: Option<i64>,
    pub circuit_breaker_threshold: Option<u32>,
    pub circuit_breaker_backoff_base_secs: Option<u64>,
    pub circuit_breaker_backoff_max_secs: Option<u64>,
    pub proxy_source_url: Option<String>,
    pub event_bus_capacity: Option<usize>,
}

/// Application configuration shared by the feed and crawler services
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the live radar feed (polled once per update cycle)
    pub radar_service_url: String,
    /// Track only aircraft whose mode-S address is in a military range
    pub military_only: bool,
    /// Retention period for flight/position rows; 0 disables expiry
    pub retention_minutes: i64,
    /// Folder holding auxiliary data files (mil_ranges.json)
    pub data_folder: PathBuf,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Flight-update cycle interval
    pub update_interval_secs: u64,
    /// Metadata crawler cycle interval
    pub crawl_interval_secs: u64,
    /// Aircraft pulled from the processing queue per crawl cycle
    pub crawler_batch_size: u32,
    /// Not-found attempts before an aircraft is considered unresolvable
    pub crawler_max_attempts: u32,
    /// Cooldown before a service-error entry becomes eligible again
    pub service_error_reset_hours: i64,
    /// Re-crawl complete metadata records older than this
    pub staleness_days: i64,
    /// Re-crawl incomplete metadata records older than this (shorter)
    pub incomplete_staleness_days: i64,
    /// Consecutive source failures before the circuit opens
    pub circuit_breaker_threshold: u32,
    /// Base backoff once a circuit has opened
    pub circuit_breaker_backoff_base_secs: u64,
    /// Backoff ceiling for repeatedly tripping circuits
    pub circuit_breaker_backoff_max_secs: u64,
    /// Optional base URL of a proxy lookup source (disabled when unset)
    pub proxy_source_url: Option<String>,
    /// EventBus channel capacity
    pub event_bus_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            radar_service_url: "http://flightlive.gotdns.ch:8084/VirtualRadar".to_string(),
            military_only: false,
            retention_minutes: 1440,
            data_folder: PathBuf::from("resources"),
            database_path: default_database_path(),
            update_interval_secs: 1,
            crawl_interval_secs: 20,
            crawler_batch_size: 50,
            crawler_max_attempts: 5,
            service_error_reset_hours: 6,
            staleness_days: 120,
            incomplete_staleness_days: 7,
            circuit_breaker_threshold: 5,
            circuit_breaker_backoff_base_secs: 300,
            circuit_breaker_backoff_max_secs: 3600,
            proxy_source_url: None,
            event_bus_capacity: 1000,
        }
    }
}

/// OS-dependent default database location (<data dir>/skytrack/skytrack.db)
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("skytrack"))
        .unwrap_or_else(|| PathBuf::from("./skytrack_data"))
        .join("skytrack.db")
}

/// Default config file location (<config dir>/skytrack/config.toml)
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("skytrack").join("config.toml"))
}

fn str2bool(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "yes" | "true" | "t" | "1")
}

fn sanitize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

impl Config {
    /// Load configuration: TOML file (SKYTRACK_CONFIG or the default
    /// location) overlaid with SKYTRACK_* environment variables.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        let file = std::env::var("SKYTRACK_CONFIG")
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_file);

        if let Some(path) = file {
            if path.is_file() {
                let content = std::fs::read_to_string(&path)?;
                let toml_config: TomlConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                config.apply_toml(toml_config);
                info!("Config loaded from {}", path.display());
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_toml(&mut self, t: TomlConfig) {
        if let Some(v) = t.radar_service_url {
            self.radar_service_url = sanitize_url(&v);
        }
        if let Some(v) = t.military_only {
            self.military_only = v;
        }
        if let Some(v) = t.retention_minutes {
            self.retention_minutes = v;
        }
        if let Some(v) = t.data_folder {
            self.data_folder = PathBuf::from(v);
        }
        if let Some(v) = t.database_path {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = t.update_interval_secs {
            self.update_interval_secs = v;
        }
        if let Some(v) = t.crawl_interval_secs {
            self.crawl_interval_secs = v;
        }
        if let Some(v) = t.crawler_batch_size {
            self.crawler_batch_size = v;
        }
        if let Some(v) = t.crawler_max_attempts {
            self.crawler_max_attempts = v;
        }
        if let Some(v) = t.service_error_reset_hours {
            self.service_error_reset_hours = v;
        }
        if let Some(v) = t.staleness_days {
            self.staleness_days = v;
        }
        if let Some(v) = t.incomplete_staleness_days {
            self.incomplete_staleness_days = v;
        }
        if let Some(v) = t.circuit_breaker_threshold {
            self.circuit_breaker_threshold = v;
        }
        if let Some(v) = t.circuit_breaker_backoff_base_secs {
            self.circuit_breaker_backoff_base_secs = v;
        }
        if let Some(v) = t.circuit_breaker_backoff_max_secs {
            self.circuit_breaker_backoff_max_secs = v;
        }
        if let Some(v) = t.proxy_source_url {
            self.proxy_source_url = Some(sanitize_url(&v));
        }
        if let Some(v) = t.event_bus_capacity {
            self.event_bus_capacity = v;
        }
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("SKYTRACK_RADAR_SERVICE_URL") {
            self.radar_service_url = sanitize_url(&v);
        }
        if let Ok(v) = std::env::var("SKYTRACK_MILITARY_ONLY") {
            self.military_only = str2bool(&v);
        }
        if let Ok(v) = std::env::var("SKYTRACK_RETENTION_MINUTES") {
            if let Ok(n) = v.parse() {
                self.retention_minutes = n;
            }
        }
        if let Ok(v) = std::env::var("SKYTRACK_DATA_FOLDER") {
            self.data_folder = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SKYTRACK_DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SKYTRACK_UPDATE_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                self.update_interval_secs = n;
            }
        }
        if let Ok(v) = std::env::var("SKYTRACK_CRAWL_INTERVAL_SECS") {
            if let Ok(n) = v.parse() {
                self.crawl_interval_secs = n;
            }
        }
        if let Ok(v) = std::env::var("SKYTRACK_CRAWLER_BATCH_SIZE") {
            if let Ok(n) = v.parse() {
                self.crawler_batch_size = n;
            }
        }
        if let Ok(v) = std::env::var("SKYTRACK_CRAWLER_MAX_ATTEMPTS") {
            if let Ok(n) = v.parse() {
                self.crawler_max_attempts = n;
            }
        }
        if let Ok(v) = std::env::var("SKYTRACK_SERVICE_ERROR_RESET_HOURS") {
            if let Ok(n) = v.parse() {
                self.service_error_reset_hours = n;
            }
        }
        if let Ok(v) = std::env::var("SKYTRACK_STALENESS_DAYS") {
            if let Ok(n) = v.parse() {
                self.staleness_days = n;
            }
        }
        if let Ok(v) = std::env::var("SKYTRACK_INCOMPLETE_STALENESS_DAYS") {
            if let Ok(n) = v.parse() {
                self.incomplete_staleness_days = n;
            }
        }
        if let Ok(v) = std::env::var("SKYTRACK_CIRCUIT_BREAKER_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.circuit_breaker_threshold = n;
            }
        }
        if let Ok(v) = std::env::var("SKYTRACK_CIRCUIT_BREAKER_BACKOFF_BASE_SECS") {
            if let Ok(n) = v.parse() {
                self.circuit_breaker_backoff_base_secs = n;
            }
        }
        if let Ok(v) = std::env::var("SKYTRACK_CIRCUIT_BREAKER_BACKOFF_MAX_SECS") {
            if let Ok(n) = v.parse() {
                self.circuit_breaker_backoff_max_secs = n;
            }
        }
        if let Ok(v) = std::env::var("SKYTRACK_PROXY_SOURCE_URL") {
            if v.is_empty() {
                self.proxy_source_url = None;
            } else {
                self.proxy_source_url = Some(sanitize_url(&v));
            }
        }
        if let Ok(v) = std::env::var("SKYTRACK_EVENT_BUS_CAPACITY") {
            if let Ok(n) = v.parse() {
                self.event_bus_capacity = n;
            }
        }
    }

    /// Whether flight/position retention expiry is enabled
    pub fn retention_enabled(&self) -> bool {
        self.retention_minutes > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.staleness_days, 120);
        assert_eq!(config.incomplete_staleness_days, 7);
        assert_eq!(config.crawler_max_attempts, 5);
        assert_eq!(config.circuit_breaker_threshold, 5);
        assert_eq!(config.crawler_batch_size, 50);
        assert!(!config.military_only);
        assert!(config.retention_enabled());
        assert!(config.proxy_source_url.is_none());
    }

    #[test]
    fn test_str2bool() {
        assert!(str2bool("yes"));
        assert!(str2bool("True"));
        assert!(str2bool("1"));
        assert!(!str2bool("no"));
        assert!(!str2bool("0"));
    }

    #[test]
    fn test_toml_overlay() {
        let toml_config: TomlConfig = toml::from_str(
            r#"
            radar_service_url = "http://radar.example.org/feed/"
            military_only = true
            staleness_days = 30
            "#,
        )
        .unwrap();

        let mut config = Config::default();
        config.apply_toml(toml_config);

        assert_eq!(config.radar_service_url, "http://radar.example.org/feed");
        assert!(config.military_only);
        assert_eq!(config.staleness_days, 30);
        // Untouched keys keep their defaults
        assert_eq!(config.incomplete_staleness_days, 7);
    }
}
