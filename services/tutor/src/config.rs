//! services/tutor/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// The single backend endpoint every action request is POSTed to.
    pub api_url: String,
    /// Credential sent as both `Authorization: Bearer` and `apikey` headers.
    pub api_key: String,
    pub log_level: Level,
    /// Total budget for a one-shot request/response round trip.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let api_url = std::env::var("TUTOR_API_URL")
            .map_err(|_| ConfigError::MissingVar("TUTOR_API_URL".to_string()))?;

        let api_key = std::env::var("TUTOR_API_KEY")
            .map_err(|_| ConfigError::MissingVar("TUTOR_API_KEY".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let request_timeout = parse_secs("TUTOR_REQUEST_TIMEOUT_SECS", 30)?;
        let connect_timeout = parse_secs("TUTOR_CONNECT_TIMEOUT_SECS", 10)?;

        Ok(Self {
            api_url,
            api_key,
            log_level,
            request_timeout,
            connect_timeout,
        })
    }
}

/// Reads an optional whole-seconds duration variable, falling back to `default`.
fn parse_secs(var: &str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Err(_) => Ok(Duration::from_secs(default)),
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| {
                ConfigError::InvalidValue(
                    var.to_string(),
                    format!("'{}' is not a whole number of seconds", raw),
                )
            }),
    }
}
