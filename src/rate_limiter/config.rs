//! Rate limiter configuration.

use crate::core::{ConfigError, ConfigResult};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`RateLimiter`](super::RateLimiter).
///
/// Deserializes with every field optional; durations are written as integer
/// milliseconds (`period_ms`, `reset_timeout_ms`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Name of the protected resource, stamped on rejections and events.
    pub name: String,

    /// Operations admitted per period once the burst is spent.
    pub rate_per_period: f64,

    /// Length of the period `rate_per_period` refers to.
    #[serde(with = "crate::core::serde_millis", rename = "period_ms")]
    pub period: Duration,

    /// Bucket capacity. Defaults to `max(10, floor(rate_per_period / 6))`.
    pub burst_size: Option<u32>,

    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before a probe is let through.
    #[serde(with = "crate::core::serde_millis", rename = "reset_timeout_ms")]
    pub reset_timeout: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            rate_per_period: 60.0,
            period: Duration::from_secs(60),
            burst_size: None,
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

impl RateLimiterConfig {
    /// Creates a configuration admitting `rate_per_minute` operations per
    /// minute.
    pub fn new(rate_per_minute: f64) -> Self {
        Self {
            rate_per_period: rate_per_minute,
            ..Self::default()
        }
    }

    /// Creates a configuration admitting `rate` operations per second.
    pub fn per_second(rate: f64) -> Self {
        Self {
            rate_per_period: rate,
            period: Duration::from_secs(1),
            ..Self::default()
        }
    }

    /// Sets the resource name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the rate period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sets the burst size.
    pub fn with_burst_size(mut self, burst_size: u32) -> Self {
        self.burst_size = Some(burst_size);
        self
    }

    /// Sets the failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the circuit reset timeout.
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Returns the bucket capacity this configuration produces.
    pub fn effective_burst_size(&self) -> u32 {
        self.burst_size
            .unwrap_or_else(|| ((self.rate_per_period / 6.0).floor() as u32).max(10))
    }

    /// Returns the refill rate in tokens per second.
    pub fn refill_per_second(&self) -> f64 {
        self.rate_per_period / self.period.as_secs_f64()
    }

    /// Checks every setting.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.rate_per_period.is_finite() || self.rate_per_period <= 0.0 {
            return Err(ConfigError::invalid(
                "rate_per_period",
                format!("must be a positive number, got {}", self.rate_per_period),
            ));
        }
        if self.period.is_zero() {
            return Err(ConfigError::invalid("period", "must be non-zero"));
        }
        if self.burst_size == Some(0) {
            return Err(ConfigError::invalid("burst_size", "must be at least 1"));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold", "must be at least 1"));
        }
        Ok(())
    }
}
