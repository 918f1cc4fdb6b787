//! Configuration management for the server.

use outbox_engine::{SyncConfig, SyncConfigUpdate};
use reqwest::Url;
use std::env;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Base URL of the remote store
    pub remote_url: Url,
    /// Per-request timeout for the remote store
    pub remote_timeout: Duration,
    /// Shared bearer token for mutating routes
    pub auth_secret: Option<String>,
    /// Initial engine settings
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let raw_url = lookup("REMOTE_URL").ok_or(ConfigError::MissingRemoteUrl)?;
        let remote_url = Url::parse(&raw_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or(ConfigError::InvalidRemoteUrl(raw_url))?;

        let remote_timeout =
            Duration::from_secs(parse_var(&lookup, "REMOTE_TIMEOUT_SECS")?.unwrap_or(30));

        let auth_secret = lookup("AUTH_SECRET").filter(|secret| !secret.is_empty());

        let update = SyncConfigUpdate {
            auto_sync: lookup("AUTO_SYNC")
                .map(|value| parse_bool("AUTO_SYNC", &value))
                .transpose()?,
            sync_interval_minutes: parse_var(&lookup, "SYNC_INTERVAL_MINUTES")?,
            max_retries: parse_var(&lookup, "MAX_RETRIES")?,
            batch_size: parse_var(&lookup, "BATCH_SIZE")?,
            conflict_resolution: parse_var(&lookup, "CONFLICT_RESOLUTION")?,
            priority: parse_var(&lookup, "SYNC_PRIORITY")?,
        };
        let sync = SyncConfig::default().merged(&update);
        sync.validate()?;

        Ok(Self {
            host,
            port,
            remote_url,
            remote_timeout,
            auth_secret,
            sync,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name, value })
        })
        .transpose()
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("REMOTE_URL environment variable is required")]
    MissingRemoteUrl,

    #[error("Invalid REMOTE_URL: {0}")]
    InvalidRemoteUrl(String),

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error(transparent)]
    Sync(#[from] outbox_engine::Error),
}
