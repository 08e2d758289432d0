//! One protected dependency: a shared limiter wrapped in retries.

use crate::core::{Failure, Retryable};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryExecutor;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Composes a [`RateLimiter`] with a [`RetryExecutor`].
///
/// Retries wrap the limiter, so every attempt waits for its own token and is
/// counted by the circuit breaker. A rejection while the circuit is open is a
/// retryable rate-limit failure and consumes one retry.
///
/// # Example
///
/// ```rust,ignore
/// use signalgate::{Guard, RateLimiter, RateLimiterConfig, RetryConfig, RetryExecutor};
/// use std::sync::Arc;
///
/// let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::new(60.0).with_name("reddit"))?);
/// let guard = Guard::new(limiter.clone(), RetryExecutor::new(RetryConfig::default())?);
///
/// let posts = guard.call(|| reddit.search("cold brew")).await?;
/// ```
#[derive(Clone)]
pub struct Guard {
    limiter: Arc<RateLimiter>,
    retry: RetryExecutor,
}

impl Guard {
    /// Creates a guard from a shared limiter and an executor.
    pub fn new(limiter: Arc<RateLimiter>, retry: RetryExecutor) -> Self {
        Self { limiter, retry }
    }

    /// Returns the limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Returns the executor.
    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    /// Runs `op` through the limiter, retrying retryable failures.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Failure> + Retryable + fmt::Display,
    {
        let limiter = self.limiter.as_ref();
        let op = &op;
        self.retry.execute(move || limiter.execute(op)).await
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("resource", &self.limiter.name())
            .field("retry", &self.retry.config())
            .finish()
    }
}
