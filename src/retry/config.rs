//! Retry configuration.

use crate::core::{ConfigError, ConfigResult};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`RetryExecutor`](super::RetryExecutor).
///
/// Deserializes with every field optional; delays are written as integer
/// milliseconds (`base_delay_ms`, `max_delay_ms`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Re-attempts after the first call. Total invocations never exceed
    /// `max_retries + 1`.
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each subsequent retry.
    #[serde(with = "crate::core::serde_millis", rename = "base_delay_ms")]
    pub base_delay: Duration,

    /// Cap on the un-jittered delay.
    #[serde(with = "crate::core::serde_millis", rename = "max_delay_ms")]
    pub max_delay: Duration,

    /// Fraction of the delay added or removed at random, within `[0, 1]`.
    pub jitter: f64,

    /// Retry every failure, ignoring its retryability verdict.
    pub retry_all_failures: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            jitter: 0.1,
            retry_all_failures: false,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Sets the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the jitter fraction.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Retries every failure regardless of its verdict.
    pub fn with_retry_all_failures(mut self, enabled: bool) -> Self {
        self.retry_all_failures = enabled;
        self
    }

    /// Applies the set fields of `overrides` on top of this configuration.
    pub fn merged(&self, overrides: &RetryOverrides) -> Self {
        Self {
            max_retries: overrides.max_retries.unwrap_or(self.max_retries),
            base_delay: overrides.base_delay.unwrap_or(self.base_delay),
            max_delay: overrides.max_delay.unwrap_or(self.max_delay),
            jitter: overrides.jitter.unwrap_or(self.jitter),
            retry_all_failures: overrides
                .retry_all_failures
                .unwrap_or(self.retry_all_failures),
        }
    }

    /// Checks every setting.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.base_delay.is_zero() {
            return Err(ConfigError::invalid("base_delay", "must be greater than zero"));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::invalid(
                "max_delay",
                format!(
                    "{:?} is shorter than base_delay {:?}",
                    self.max_delay, self.base_delay
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::invalid(
                "jitter",
                format!("must be within [0, 1], got {}", self.jitter),
            ));
        }
        Ok(())
    }

    /// Returns the un-jittered delay after the failed attempt `attempt`
    /// (0-indexed): `min(base_delay * 2^attempt, max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Returns [`delay_for_attempt`](Self::delay_for_attempt) perturbed by a
    /// uniform offset within `±jitter * delay`, floored at zero.
    ///
    /// Saturates at `Duration::MAX`.
    pub fn jittered_delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        let spread = self.jitter * delay.as_secs_f64();
        if spread <= 0.0 {
            return delay;
        }
        let offset = rng.gen_range(-spread..=spread);
        Duration::try_from_secs_f64((delay.as_secs_f64() + offset).max(0.0))
            .unwrap_or(Duration::MAX)
    }
}

/// Per-call adjustments layered on an executor's configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOverrides {
    /// Replaces `max_retries`.
    pub max_retries: Option<u32>,
    /// Replaces `base_delay`.
    pub base_delay: Option<Duration>,
    /// Replaces `max_delay`.
    pub max_delay: Option<Duration>,
    /// Replaces `jitter`.
    pub jitter: Option<f64>,
    /// Replaces `retry_all_failures`.
    pub retry_all_failures: Option<bool>,
}

impl RetryOverrides {
    /// Creates empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the retry budget.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Overrides the base delay.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Overrides the maximum delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Overrides the jitter fraction.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Overrides `retry_all_failures`.
    pub fn retry_all_failures(mut self, enabled: bool) -> Self {
        self.retry_all_failures = Some(enabled);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.jitter, 0.1);
        assert!(!config.retry_all_failures);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_retry() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_retries, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_bounds() {
        let cases = [
            (RetryConfig::new().with_base_delay(Duration::ZERO), "base_delay"),
            (
                RetryConfig::new()
                    .with_base_delay(Duration::from_secs(2))
                    .with_max_delay(Duration::from_secs(1)),
                "max_delay",
            ),
            (RetryConfig::new().with_jitter(-0.1), "jitter"),
            (RetryConfig::new().with_jitter(1.5), "jitter"),
            (RetryConfig::new().with_jitter(f64::NAN), "jitter"),
        ];
        for (config, field) in cases {
            assert_eq!(config.validate().unwrap_err().field(), field);
        }

        assert!(RetryConfig::new().with_jitter(0.0).validate().is_ok());
        assert!(RetryConfig::new().with_jitter(1.0).validate().is_ok());
        assert!(RetryConfig::new()
            .with_base_delay(Duration::from_secs(5))
            .with_max_delay(Duration::from_secs(5))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_millis(100))
            .with_jitter(0.0);

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5));

        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_huge_delays_saturate() {
        let mut rng = StdRng::seed_from_u64(3);

        let config = RetryConfig::new()
            .with_base_delay(Duration::MAX)
            .with_max_delay(Duration::MAX)
            .with_jitter(0.0);
        assert!(config.validate().is_ok());
        assert_eq!(config.jittered_delay(0, &mut rng), Duration::MAX);
        assert_eq!(config.jittered_delay(5, &mut rng), Duration::MAX);

        let config = config.with_jitter(0.5);
        for attempt in 0..4 {
            let delay = config.jittered_delay(attempt, &mut rng);
            assert!(delay >= Duration::from_secs(u64::MAX / 4), "{delay:?}");
        }

        let config = RetryConfig::new()
            .with_base_delay(Duration::from_secs(u64::MAX / 2))
            .with_max_delay(Duration::MAX)
            .with_jitter(1.0);
        assert!(config.validate().is_ok());
        for _ in 0..50 {
            assert!(config.jittered_delay(1, &mut rng) <= Duration::MAX);
        }
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(10))
            .with_jitter(0.25);
        let mut rng = StdRng::seed_from_u64(7);

        for attempt in 0..6 {
            let nominal = config.delay_for_attempt(attempt).as_secs_f64();
            for _ in 0..200 {
                let delay = config.jittered_delay(attempt, &mut rng).as_secs_f64();
                assert!(delay >= nominal * 0.75 - 1e-9, "attempt {attempt}: {delay}");
                assert!(delay <= nominal * 1.25 + 1e-9, "attempt {attempt}: {delay}");
            }
        }
    }

    #[test]
    fn test_full_jitter_never_negative() {
        let config = RetryConfig::new().with_jitter(1.0);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            assert!(config.jittered_delay(0, &mut rng) <= Duration::from_secs(2));
        }
    }

    #[test]
    fn test_merge_overrides() {
        let base = RetryConfig::new();
        let merged = base.merged(
            &RetryOverrides::new()
                .max_retries(1)
                .retry_all_failures(true),
        );
        assert_eq!(merged.max_retries, 1);
        assert!(merged.retry_all_failures);
        assert_eq!(merged.base_delay, base.base_delay);
        assert_eq!(base.merged(&RetryOverrides::default()), base);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: RetryConfig =
            serde_json::from_str(r#"{"max_retries": 5, "base_delay_ms": 250}"#).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.jitter, 0.1);
    }
}
