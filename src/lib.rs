//! # Signalgate
//!
//! Resilience primitives for services that call rate-limited, flaky external
//! dependencies such as social media APIs, trend feeds and text generators.
//!
//! ## Overview
//!
//! Signalgate wraps any async operation and lets you:
//!
//! - Pace calls to a dependency with a token bucket
//! - Stop calling a failing dependency with a circuit breaker
//! - Retry transient failures with exponential backoff and jitter
//! - Classify failures so that only the transient ones are retried
//! - Observe every throttle, rejection, circuit transition and retry
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use signalgate::{Failure, Guard, RateLimiter, RateLimiterConfig, RetryConfig, RetryExecutor};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // One limiter per dependency, shared by every caller
//!     let limiter = Arc::new(RateLimiter::new(
//!         RateLimiterConfig::new(60.0).with_name("trends-api"),
//!     )?);
//!
//!     // Retries wrap the limiter
//!     let guard = Guard::new(limiter, RetryExecutor::new(RetryConfig::default())?);
//!
//!     let trends = guard
//!         .call(|| async { fetch_trends("espresso").await.map_err(Failure::from) })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Core**: The failure taxonomy, clocks and the observer contract
//! - **Rate Limiter**: Token-bucket admission with a circuit breaker
//! - **Retry**: Exponential backoff driven by retryability verdicts
//! - **Guard**: A limiter and an executor composed for one dependency
//! - **Mock**: Scripted dependencies and a recording observer for tests
//!
//! Every event is logged through `tracing` under the
//! `signalgate::resilience` target.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod guard;
pub mod mock;
pub mod rate_limiter;
pub mod retry;

// Re-export commonly used types at the crate root
pub use crate::core::{
    ArcClock, ArcObserver, Clock, ConfigError, ConfigResult, EventLevel, Failure, FailureKind,
    FailureResult, ManualClock, Observer, ResilienceEvent, Retryable, StructuredFailure,
    TokioClock,
};

pub use crate::guard::Guard;
pub use crate::rate_limiter::{
    CircuitPhase, LimiterMetrics, LimiterStats, RateLimiter, RateLimiterBuilder, RateLimiterConfig,
};
pub use crate::retry::{RetryConfig, RetryExecutor, RetryExecutorBuilder, RetryOverrides};

/// Prelude module for convenient imports.
///
/// ```rust
/// use signalgate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        ConfigError, Failure, FailureKind, FailureResult, Observer, ResilienceEvent, Retryable,
    };
    pub use crate::guard::Guard;
    pub use crate::rate_limiter::{CircuitPhase, RateLimiter, RateLimiterConfig};
    pub use crate::retry::{RetryConfig, RetryExecutor, RetryOverrides};
}
