//! Connection parameters: per-attempt timeout and retry policy.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delay before a retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Settings owned by a [`super::RetryingConnection`]. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    timeout: Duration,
    retry_delay: Duration,
    max_retries: usize,
    backoff: f64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: 1.0,
        }
    }
}

/// On-disk form, durations in (possibly fractional) seconds.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    timeout_secs: Option<f64>,
    retry_delay_secs: Option<f64>,
    max_retries: Option<usize>,
    backoff: Option<f64>,
}

impl ConnectionConfig {
    /// Creates a config with a fixed retry delay.
    pub fn new(timeout: Duration, retry_delay: Duration, max_retries: usize) -> Self {
        Self {
            timeout,
            retry_delay,
            max_retries,
            backoff: 1.0,
        }
    }

    /// Multiplies the retry delay by `backoff` after every retry.
    /// `1.0` keeps the delay fixed.
    pub fn with_backoff(mut self, backoff: f64) -> Result<Self> {
        if !backoff.is_finite() || backoff < 1.0 {
            anyhow::bail!("Invalid backoff factor {}: must be a finite number >= 1.0", backoff);
        }
        self.backoff = backoff;
        Ok(self)
    }

    /// Parses a JSON document; keys that are absent keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ConfigFile =
            serde_json::from_str(json).context("Failed to parse connection config")?;

        let defaults = Self::default();
        let config = Self::new(
            secs_or(file.timeout_secs, defaults.timeout, "timeout_secs")?,
            secs_or(file.retry_delay_secs, defaults.retry_delay, "retry_delay_secs")?,
            file.max_retries.unwrap_or(defaults.max_retries),
        );
        match file.backoff {
            Some(backoff) => config.with_backoff(backoff),
            None => Ok(config),
        }
    }

    /// Reads a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Returns the per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the delay before the first retry.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Returns the number of retries allowed after the first attempt.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Returns the retry delay multiplier.
    pub fn backoff(&self) -> f64 {
        self.backoff
    }

    /// Delay to wait before retry number `retry` (0-based).
    pub fn delay_for_retry(&self, retry: usize) -> Duration {
        if self.backoff == 1.0 || self.retry_delay.is_zero() {
            return self.retry_delay;
        }
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let factor = self.backoff.powi(exponent);
        Duration::try_from_secs_f64(self.retry_delay.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }
}

fn secs_or(value: Option<f64>, default: Duration, key: &str) -> Result<Duration> {
    match value {
        Some(secs) => Duration::try_from_secs_f64(secs)
            .with_context(|| format!("Invalid {}: {} is not a valid number of seconds", key, secs)),
        None => Ok(default),
    }
}
