use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Vendor token cannot be empty")]
    EmptyToken,

    #[error("retry_attempts must be at least 1")]
    InvalidRetryAttempts,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Vendor credential and endpoints.
///
/// Injected into the transport client at construction so that tests can
/// point it at a stub server. Never mutated after startup.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct VendorConfig {
    /// Project credential identifying which vendor project receives the
    /// data. Must never be exposed to browser code.
    pub token: String,
    /// Event ingestion endpoint
    ///
    /// Note: Uses the `url::Url` type for compile-time URL validation.
    /// Invalid URLs will be rejected during config deserialization.
    pub event_url: Url,
    /// Profile (engage) ingestion endpoint
    pub profile_url: Url,
    #[serde(default = "default_timeout_secs")]
    pub event_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub profile_timeout_secs: u64,
    /// Total send attempts for one event, including the first. Only
    /// transport-level failures are retried.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_backoff_ms")]
    pub retry_base_backoff_ms: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_retry_base_backoff_ms() -> u64 {
    100
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

/// Relay configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    pub vendor: VendorConfig,
    pub metrics: Option<MetricsConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config = serde_yaml::from_reader(file)?;

        Ok(config)
    }

    /// Validates the relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if self.vendor.token.is_empty() {
            return Err(ValidationError::EmptyToken);
        }

        if self.vendor.retry_attempts == 0 {
            return Err(ValidationError::InvalidRetryAttempts);
        }

        Ok(())
    }
}
