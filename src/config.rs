//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `QUAKEWATCH_*` environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dashboard::{PanelSpec, SchedulerConfig};
use crate::pipeline::SeriesOrder;
use crate::sources::{UsgsConfig, DEFAULT_USGS_URL};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub preferences: PreferencesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8086
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// USGS feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub url: String,

    #[serde(default = "default_min_magnitude")]
    pub min_magnitude: f64,

    /// 0 leaves the transport default in place
    #[serde(default)]
    pub request_timeout_secs: u64,
}

fn default_feed_url() -> String {
    DEFAULT_USGS_URL.to_string()
}

fn default_min_magnitude() -> f64 {
    1.0
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            min_magnitude: default_min_magnitude(),
            request_timeout_secs: 0,
        }
    }
}

impl FeedConfig {
    pub fn usgs(&self) -> UsgsConfig {
        UsgsConfig {
            base_url: self.url.clone(),
            min_magnitude: self.min_magnitude,
            request_timeout: (self.request_timeout_secs > 0)
                .then(|| Duration::from_secs(self.request_timeout_secs)),
        }
    }
}

/// Refresh scheduler and panel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,

    #[serde(default)]
    pub skip_if_in_flight: bool,

    #[serde(default)]
    pub series_order: SeriesOrder,

    /// Panel set; the nine stock panels when omitted
    #[serde(default = "PanelSpec::defaults")]
    pub panels: Vec<PanelSpec>,
}

fn default_refresh_secs() -> u64 {
    60
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_secs: default_refresh_secs(),
            skip_if_in_flight: false,
            series_order: SeriesOrder::default(),
            panels: PanelSpec::defaults(),
        }
    }
}

impl DashboardConfig {
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            period: Duration::from_secs(self.refresh_secs.max(1)),
            skip_if_in_flight: self.skip_if_in_flight,
            series_order: self.series_order,
        }
    }
}

/// Preference storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PreferencesConfig {
    #[serde(default = "default_preferences_path")]
    pub path: String,
}

fn default_preferences_path() -> String {
    crate::preferences::FileStore::default_path()
        .to_string_lossy()
        .to_string()
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: default_preferences_path(),
        }
    }
}

impl PreferencesConfig {
    /// Path with a leading `~/` expanded to the home directory
    pub fn resolved_path(&self) -> PathBuf {
        match (self.path.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(&self.path),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub fn filter_directive(&self) -> String {
        format!("quakewatch={level},tower_http={level}", level = self.level)
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("quakewatch").join("config.toml")),
            Some(PathBuf::from("/etc/quakewatch/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // API overrides
        if let Some(host) = var("QUAKEWATCH_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("QUAKEWATCH_API_PORT").and_then(|p| p.parse().ok()) {
            self.api.port = port;
        }

        // Feed overrides
        if let Some(url) = var("QUAKEWATCH_FEED_URL") {
            self.feed.url = url;
        }
        if let Some(mag) = var("QUAKEWATCH_MIN_MAGNITUDE").and_then(|m| m.parse().ok()) {
            self.feed.min_magnitude = mag;
        }

        // Dashboard overrides
        if let Some(secs) = var("QUAKEWATCH_REFRESH_SECS").and_then(|s| s.parse().ok()) {
            self.dashboard.refresh_secs = secs;
        }

        // Preference overrides
        if let Some(path) = var("QUAKEWATCH_PREFERENCES_PATH") {
            self.preferences.path = path;
        }

        // Logging overrides
        if let Some(level) = var("QUAKEWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("QUAKEWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# QuakeWatch Configuration
#
# Environment variables override these settings:
# - QUAKEWATCH_API_HOST
# - QUAKEWATCH_API_PORT
# - QUAKEWATCH_FEED_URL
# - QUAKEWATCH_MIN_MAGNITUDE
# - QUAKEWATCH_REFRESH_SECS
# - QUAKEWATCH_PREFERENCES_PATH
# - QUAKEWATCH_LOG_LEVEL
# - QUAKEWATCH_LOG_FORMAT

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8086

[feed]
# USGS event query endpoint
url = "https://earthquake.usgs.gov/fdsnws/event/1/query"

# Smallest magnitude requested from the feed
min_magnitude = 1.0

# Request timeout in seconds (0 = transport default)
request_timeout_secs = 0

[dashboard]
# Seconds between refresh ticks
refresh_secs = 60

# Skip a panel while its previous run is still in flight
skip_if_in_flight = false

# Point order handed to the charts: chronological or first_seen
series_order = "chronological"

# Custom panels replace the nine stock panels
# [[dashboard.panels]]
# id = "earth-15min"
# body = "earth"
# lookback_minutes = 720
# interval_minutes = 15

[preferences]
# JSON file holding per-page UI preferences
path = "~/.local/share/quakewatch/preferences.json"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
