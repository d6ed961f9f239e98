//! Bootstrap configuration loading
//!
//! The TOML file carries only bootstrap concerns: where the database lives,
//! Spotify credentials, the queue-rules file, poll intervals and logging.
//! Settings resolve in priority order:
//! 1. Command-line argument / environment variable (applied by the binary)
//! 2. TOML config file
//! 3. Compiled defaults
//!
//! A missing config file is not an error: a warning is logged and defaults
//! are used. Missing credentials are caught later, when the binary assembles
//! its final configuration.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const APP_DIR: &str = "playtrail";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Path to the queue rules JSON file
    #[serde(default)]
    pub queue_rules_path: Option<PathBuf>,

    #[serde(default)]
    pub spotify: SpotifyConfig,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Spotify application credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Long-lived refresh token from a completed authorization-code flow
    pub refresh_token: Option<String>,
}

/// Inter-cycle sleep lengths, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_playing_ms")]
    pub playing_ms: u64,
    #[serde(default = "default_paused_ms")]
    pub paused_ms: u64,
    #[serde(default = "default_idle_ms")]
    pub idle_ms: u64,
    #[serde(default = "default_error_ms")]
    pub error_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            playing_ms: default_playing_ms(),
            paused_ms: default_paused_ms(),
            idle_ms: default_idle_ms(),
            error_ms: default_error_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_playing_ms() -> u64 {
    5_000
}

fn default_paused_ms() -> u64 {
    30_000
}

fn default_idle_ms() -> u64 {
    60_000
}

fn default_error_ms() -> u64 {
    15_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))
    }

    /// Load configuration from a file, falling back to defaults if it is missing
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config file: {}", path.display());
        Ok(config)
    }
}

/// Default configuration file path for the platform
///
/// `~/.config/playtrail/config.toml` on Linux, the platform equivalent elsewhere.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR).join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("./config.toml"))
}

/// Default database path for the platform
///
/// `~/.local/share/playtrail/playtrail.db` on Linux, the platform equivalent elsewhere.
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR).join("playtrail.db"))
        .unwrap_or_else(|| PathBuf::from("./playtrail_data/playtrail.db"))
}

/// Default queue rules path, next to the config file
pub fn default_queue_rules_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR).join("queue.json"))
        .unwrap_or_else(|| PathBuf::from("./queue.json"))
}
