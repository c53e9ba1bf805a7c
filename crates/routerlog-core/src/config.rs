//! Configuration types for the collector
//!
//! This module defines all configuration structures used throughout the crate.
//! Keys from the legacy `config.json` layout (`ROUTER_URLS`, `DATABASE_FILE`, ...)
//! are accepted as aliases.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Endpoints returning per-device traffic counters
    #[serde(alias = "ROUTER_URLS")]
    pub traffic_urls: Vec<String>,

    /// Endpoints returning DHCP lease dumps
    #[serde(default, alias = "DHCP_LEASE_URLS")]
    pub lease_urls: Vec<String>,

    /// SQLite database location
    #[serde(alias = "DATABASE_FILE")]
    pub database_path: PathBuf,

    /// Hour of day (0-23) at which daily tasks run
    #[serde(default, alias = "DAILY_RUN_HOUR")]
    pub daily_run_hour: u32,

    /// Fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Retention settings
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl CollectorConfig {
    /// Create a configuration with defaults for everything but the URLs and database
    pub fn new(traffic_urls: Vec<String>, database_path: impl Into<PathBuf>) -> Self {
        Self {
            traffic_urls,
            lease_urls: Vec::new(),
            database_path: database_path.into(),
            daily_run_hour: 0,
            fetch: FetchConfig::default(),
            retention: RetentionConfig::default(),
        }
    }

    /// Load and validate a configuration file
    ///
    /// A relative `database_path` is resolved against the directory holding
    /// the configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_json(&content)?;

        if config.database_path.is_relative() {
            if let Some(dir) = path.parent() {
                config.database_path = dir.join(&config.database_path);
            }
        }

        Ok(config)
    }

    /// Parse and validate a configuration from JSON text
    pub fn from_json(content: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| crate::Error::config(format!("Invalid configuration JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.traffic_urls.is_empty() && self.lease_urls.is_empty() {
            return Err(crate::Error::config("No traffic or lease URLs configured"));
        }

        for url in self.traffic_urls.iter().chain(self.lease_urls.iter()) {
            validate_url(url)?;
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(crate::Error::config("Database path cannot be empty"));
        }

        if self.daily_run_hour > 23 {
            return Err(crate::Error::config(format!(
                "Daily run hour must be between 0 and 23. Got: {}",
                self.daily_run_hour
            )));
        }

        self.fetch.validate()?;

        Ok(())
    }
}

fn validate_url(url: &str) -> Result<(), crate::Error> {
    if url.trim().is_empty() {
        return Err(crate::Error::config("URL cannot be empty"));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(crate::Error::config(format!(
            "URL must use HTTP or HTTPS scheme. Got: {}",
            url
        )));
    }
    Ok(())
}

/// Fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Total attempts per URL, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff between attempts (in milliseconds), doubled after every failure
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Per-request timeout (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl FetchConfig {
    /// Validate the fetch configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_attempts == 0 {
            return Err(crate::Error::config("Fetch max_attempts must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Fetch timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base backoff between attempts
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    10
}

/// Retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Cutoff policy for usage samples
    #[serde(default)]
    pub samples: SampleRetention,

    /// Maximum age of lease records in days (absent or non-positive disables the sweep)
    #[serde(default)]
    pub lease_max_age_days: Option<i64>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            samples: SampleRetention::CalendarMonth,
            lease_max_age_days: None,
        }
    }
}

/// Cutoff policy for usage samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SampleRetention {
    /// Keep only samples from the current calendar month
    #[default]
    CalendarMonth,

    /// Keep samples from the last `days` days (absent or non-positive disables)
    RollingWindow {
        /// Window length in days
        #[serde(default)]
        days: i64,
    },

    /// Never delete samples
    Disabled,
}
