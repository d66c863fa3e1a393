//! Process configuration.
//!
//! Resolution order: built-in defaults, then the JSON file named by
//! `ATELIER_CONFIG` (if set), then the `ATELIER_BIND` override.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use atelier_core::Currency;
use atelier_notifications::StockThresholds;

use crate::persistence::RetryPolicy;

pub const CONFIG_ENV: &str = "ATELIER_CONFIG";
pub const BIND_ENV: &str = "ATELIER_BIND";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Retry settings for the persistence writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Total write attempts per envelope, first try included.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtelierConfig {
    pub bind_addr: String,
    pub currency: Currency,
    /// Validated on deserialization; a broken level table fails the load.
    pub stock_levels: StockThresholds,
    pub persistence: PersistenceConfig,
}

impl Default for AtelierConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            currency: Currency::default(),
            stock_levels: StockThresholds::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl AtelierConfig {
    /// Load from the environment (see module docs).
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                tracing::info!(path = %path, "loading config file");
                Self::from_file(path)?
            }
            Err(_) => {
                tracing::info!("{CONFIG_ENV} not set; using built-in defaults");
                Self::default()
            }
        };

        if let Ok(bind) = std::env::var(BIND_ENV) {
            config.bind_addr = bind;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parse a (possibly partial) JSON document over the defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if self.currency.code.trim().is_empty() {
            return Err(ConfigError::Invalid("currency code cannot be empty".to_string()));
        }
        if self.currency.minor_units > 6 {
            return Err(ConfigError::Invalid(format!(
                "currency minor_units {} is out of range",
                self.currency.minor_units
            )));
        }
        if self.persistence.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "persistence.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bind_addr {:?}: {e}", self.bind_addr)))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.persistence.max_attempts,
            Duration::from_millis(self.persistence.base_delay_ms),
            Duration::from_millis(self.persistence.max_delay_ms),
        )
    }
}
