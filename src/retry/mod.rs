//! Retries with exponential backoff and jitter.
//!
//! The delay before retry `n` (0-indexed) is
//! `min(base_delay * 2^n, max_delay)`, perturbed by up to `jitter` of itself
//! in either direction. Only failures whose [`Retryable`](crate::Retryable)
//! verdict is positive are retried unless `retry_all_failures` is set.

mod config;
mod executor;

pub use config::{RetryConfig, RetryOverrides};
pub use executor::{RetryExecutor, RetryExecutorBuilder};
