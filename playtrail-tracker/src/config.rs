//! Final tracker configuration
//!
//! Merges command-line/environment overrides over the TOML file over
//! compiled defaults. Spotify credentials have no default; a missing one is a
//! fatal startup error naming the variable that would supply it.

use std::path::PathBuf;

use playtrail_common::config::{
    default_database_path, default_queue_rules_path, PollConfig, TomlConfig,
};

use crate::error::{Result, TrackerError};
use crate::provider::SpotifyCredentials;

pub const CLIENT_ID_ENV: &str = "PLAYTRAIL_SPOTIFY_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "PLAYTRAIL_SPOTIFY_CLIENT_SECRET";
pub const REFRESH_TOKEN_ENV: &str = "PLAYTRAIL_SPOTIFY_REFRESH_TOKEN";

/// Values given on the command line (or through their env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub queue_rules_path: Option<PathBuf>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub log_level: Option<String>,
}

/// Storage and logging settings, enough for the offline subcommands
#[derive(Debug, Clone)]
pub struct BaseConfig {
    pub database_path: PathBuf,
    pub queue_rules_path: PathBuf,
    pub poll: PollConfig,
    pub log_level: String,
}

impl BaseConfig {
    pub fn resolve(overrides: &ConfigOverrides, file: &TomlConfig) -> Self {
        Self {
            database_path: overrides
                .database_path
                .clone()
                .or_else(|| file.database_path.clone())
                .unwrap_or_else(default_database_path),
            queue_rules_path: overrides
                .queue_rules_path
                .clone()
                .or_else(|| file.queue_rules_path.clone())
                .unwrap_or_else(default_queue_rules_path),
            poll: file.poll,
            log_level: overrides
                .log_level
                .clone()
                .unwrap_or_else(|| file.logging.level.clone()),
        }
    }
}

/// Everything the poll loop needs
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub base: BaseConfig,
    pub credentials: SpotifyCredentials,
}

fn required(
    cli: &Option<String>,
    file: &Option<String>,
    env_var: &'static str,
) -> Result<String> {
    cli.clone()
        .or_else(|| file.clone())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            TrackerError::Config(format!(
                "{} not set (command line, environment or config file)",
                env_var
            ))
        })
}

impl TrackerConfig {
    pub fn resolve(overrides: &ConfigOverrides, file: &TomlConfig) -> Result<Self> {
        let credentials = SpotifyCredentials {
            client_id: required(&overrides.client_id, &file.spotify.client_id, CLIENT_ID_ENV)?,
            client_secret: required(
                &overrides.client_secret,
                &file.spotify.client_secret,
                CLIENT_SECRET_ENV,
            )?,
            refresh_token: required(
                &overrides.refresh_token,
                &file.spotify.refresh_token,
                REFRESH_TOKEN_ENV,
            )?,
        };

        Ok(Self {
            base: BaseConfig::resolve(overrides, file),
            credentials,
        })
    }
}
