//! Serializable crawl configuration.
//!
//! Loaded from TOML; every key is optional and falls back to its default.
//!
//! ```toml
//! workers = 5
//! max_retries = 3
//! request_delay_ms = 500
//! backoff_ms = 1000
//! jitter_ms = 500
//! timeout_secs = 30
//! base_url = "https://www.taifex.com.tw/cht/3/futContractsDate"
//! scope = "complete"   # or "trading"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use taifex_core::data::{RetryPolicy, DEFAULT_BASE_URL};
use taifex_core::domain::DataScope;
use thiserror::Error;

/// Errors from loading or validating a crawl configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Concurrent fetches. Kept moderate: the exchange rate-limits.
    pub workers: usize,
    /// Attempts per task, first one included.
    pub max_retries: u32,
    /// Fixed pause before every request.
    pub request_delay_ms: u64,
    /// Added once per previous attempt.
    pub backoff_ms: u64,
    /// Upper bound of the uniform random pause added to every request.
    pub jitter_ms: u64,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
    pub base_url: String,
    pub scope: DataScope,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            max_retries: 3,
            request_delay_ms: 500,
            backoff_ms: 1000,
            jitter_ms: 500,
            timeout_secs: 30,
            base_url: DEFAULT_BASE_URL.to_string(),
            scope: DataScope::Complete,
        }
    }
}

impl CrawlConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url is empty".into()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            request_delay: Duration::from_millis(self.request_delay_ms),
            backoff: Duration::from_millis(self.backoff_ms),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
