//! Token bucket and circuit breaker state.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// A token bucket.
#[derive(Debug, Clone)]
pub(crate) struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_second: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a full bucket.
    pub(crate) fn new(capacity: u32, refill_per_second: f64, now: Instant) -> Self {
        Self {
            tokens: capacity as f64,
            capacity: capacity as f64,
            refill_per_second,
            last_refill: now,
        }
    }

    /// Adds the tokens accrued since the last refill.
    pub(crate) fn refill(&mut self, now: Instant) {
        self.tokens = self.available_at(now);
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    /// Returns the token count the bucket would hold at `now`.
    pub(crate) fn available_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * self.refill_per_second).min(self.capacity)
    }

    /// Takes one token if available.
    pub(crate) fn try_take(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Returns how long until the bucket holds `needed` tokens, rounded up
    /// to whole milliseconds.
    pub(crate) fn time_until(&self, needed: f64) -> Duration {
        let deficit = needed - self.tokens;
        if deficit <= 0.0 {
            return Duration::ZERO;
        }
        let millis = (deficit / self.refill_per_second * 1000.0).ceil();
        Duration::from_millis(millis as u64)
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.capacity as u32
    }
}

/// The externally visible phase of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitPhase {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected until the cool-down elapses.
    Open,
    /// The next call probes the resource.
    HalfOpen,
}

impl CircuitPhase {
    /// Returns the name of the phase.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Circuit breaker state machine.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) enum BreakerState {
    #[default]
    Closed,
    Open {
        opened_at: Instant,
    },
    HalfOpen,
}

impl BreakerState {
    pub(crate) fn phase(&self) -> CircuitPhase {
        match self {
            Self::Closed => CircuitPhase::Closed,
            Self::Open { .. } => CircuitPhase::Open,
            Self::HalfOpen => CircuitPhase::HalfOpen,
        }
    }
}

/// Counters describing limiter behavior since construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterMetrics {
    /// Calls that reached the limiter.
    pub total_requests: u64,
    /// Admitted calls whose operation succeeded.
    pub successful_requests: u64,
    /// Admitted calls whose operation failed.
    pub failed_requests: u64,
    /// Calls rejected because the circuit was open.
    pub rejected_requests: u64,
    /// Calls that had to wait for a token.
    pub throttled_requests: u64,
    /// Times the circuit opened.
    pub times_opened: u64,
    /// Times a probe closed the circuit.
    pub times_closed: u64,
}

impl LimiterMetrics {
    pub(crate) fn record_request(&mut self) {
        self.total_requests += 1;
    }

    pub(crate) fn record_success(&mut self) {
        self.successful_requests += 1;
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed_requests += 1;
    }

    pub(crate) fn record_rejected(&mut self) {
        self.rejected_requests += 1;
    }

    pub(crate) fn record_throttled(&mut self) {
        self.throttled_requests += 1;
    }

    pub(crate) fn record_opened(&mut self) {
        self.times_opened += 1;
    }

    pub(crate) fn record_closed(&mut self) {
        self.times_closed += 1;
    }

    /// Returns the share of completed operations that succeeded (1.0 when
    /// nothing has completed).
    pub fn success_rate(&self) -> f64 {
        let completed = self.successful_requests + self.failed_requests;
        if completed == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / completed as f64
    }

    /// Returns the share of completed operations that failed.
    pub fn failure_rate(&self) -> f64 {
        let completed = self.successful_requests + self.failed_requests;
        if completed == 0 {
            return 0.0;
        }
        self.failed_requests as f64 / completed as f64
    }
}

/// Point-in-time snapshot of a limiter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimiterStats {
    /// Resource name.
    pub name: String,
    /// Tokens in the bucket at the time of the snapshot.
    pub available_tokens: f64,
    /// Bucket capacity.
    pub capacity: u32,
    /// Configured rate per period.
    pub rate_per_period: f64,
    /// Configured period.
    #[serde(with = "crate::core::serde_millis", rename = "period_ms")]
    pub period: Duration,
    /// Circuit phase.
    pub phase: CircuitPhase,
    /// Failures in a row since the last success or reset.
    pub consecutive_failures: u32,
    /// Callers waiting for a token.
    pub pending_waiters: usize,
    /// Lifetime counters.
    pub metrics: LimiterMetrics,
}
