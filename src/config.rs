// src/config.rs
//! Client configuration.
//!
//! Layered, later sources winning:
//! 1. Built-in defaults
//! 2. `zcred.toml` in the working directory (optional)
//! 3. `ZCRED_*` environment variables, e.g. `ZCRED_ISSUER_URI`
//!
//! `.env` files are loaded into the environment before the layers are read.

use ::config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_SIGNER_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings of an issuer client and its issuance sessions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Issuer base URI ending in the credential type segment
    pub issuer_uri: String,
    /// Bearer token sent to the issuer
    #[serde(default)]
    pub access_token: Option<String>,
    /// Delay between two `can-issue` polls
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for the subject's signature
    pub signer_timeout_secs: u64,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the issuer URI.
    pub fn new(issuer_uri: impl Into<String>) -> Self {
        Self {
            issuer_uri: issuer_uri.into(),
            access_token: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            signer_timeout_secs: DEFAULT_SIGNER_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Loads `.env`, `zcred.toml` and `ZCRED_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::load_from("zcred")
    }

    /// Same as [`ClientConfig::load`] with a custom file stem and no `.env`.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("poll_interval_ms", DEFAULT_POLL_INTERVAL_MS)?
            .set_default("signer_timeout_secs", DEFAULT_SIGNER_TIMEOUT_SECS)?
            .set_default("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS)?
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("ZCRED").try_parsing(true))
            .build()?;
        let config: ClientConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer_uri.trim().is_empty() {
            return Err(ConfigError::Invalid("issuer_uri must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn signer_timeout(&self) -> Duration {
        Duration::from_secs(self.signer_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
