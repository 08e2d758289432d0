//! Exponential backoff with jitter.

use crate::core::observer::emit;
use crate::core::{
    ArcClock, ArcObserver, Clock, ConfigError, ConfigResult, EventLevel, Observer,
    ResilienceEvent, Retryable, TokioClock,
};
use crate::retry::config::{RetryConfig, RetryOverrides};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Re-invokes failed operations whose errors are retryable.
///
/// The executor never alters an error: when it gives up, the caller sees the
/// failure from the last attempt.
///
/// # Example
///
/// ```rust,ignore
/// use signalgate::{RetryConfig, RetryExecutor};
/// use std::time::Duration;
///
/// let retry = RetryExecutor::new(
///     RetryConfig::new()
///         .with_max_retries(2)
///         .with_base_delay(Duration::from_millis(100)),
/// )?;
///
/// let personas = retry.execute(|| generator.generate_batch(&seed)).await?;
/// ```
#[derive(Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    clock: ArcClock,
    observer: Option<ArcObserver>,
}

impl RetryExecutor {
    /// Creates an executor driven by the tokio timer, without an observer.
    pub fn new(config: RetryConfig) -> ConfigResult<Self> {
        Self::builder(config).build()
    }

    /// Starts building an executor.
    pub fn builder(config: RetryConfig) -> RetryExecutorBuilder {
        RetryExecutorBuilder::new(config)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns an executor with `overrides` applied, sharing this one's
    /// clock and observer.
    pub fn with_overrides(&self, overrides: &RetryOverrides) -> ConfigResult<Self> {
        let config = self.config.merged(overrides);
        config.validate()?;
        Ok(Self {
            config,
            clock: self.clock.clone(),
            observer: self.observer.clone(),
        })
    }

    /// Runs `op`, retrying retryable failures with exponential backoff.
    pub async fn execute<F, Fut, T, E>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        self.notify(
                            EventLevel::Info,
                            "Operation succeeded after retry",
                            ResilienceEvent::RetryRecovered {
                                attempts: attempt + 1,
                            },
                        );
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !(self.config.retry_all_failures || err.is_retryable()) {
                        self.notify(
                            EventLevel::Debug,
                            "Failure is not retryable",
                            ResilienceEvent::NotRetryable {
                                attempts: attempt + 1,
                                error: err.to_string(),
                            },
                        );
                        return Err(err);
                    }

                    if attempt >= self.config.max_retries {
                        self.notify(
                            EventLevel::Error,
                            "Retries exhausted",
                            ResilienceEvent::RetriesExhausted {
                                attempts: attempt + 1,
                                error: err.to_string(),
                            },
                        );
                        return Err(err);
                    }

                    let delay = self
                        .config
                        .jittered_delay(attempt, &mut rand::thread_rng());
                    self.notify(
                        EventLevel::Warn,
                        "Retrying operation",
                        ResilienceEvent::RetryScheduled {
                            attempt,
                            max_retries: self.config.max_retries,
                            delay_ms: delay.as_millis() as u64,
                            error: err.to_string(),
                        },
                    );
                    drop(err);

                    self.clock.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Runs `op` with `overrides` applied for this call only.
    ///
    /// Invalid overrides are reported before `op` is invoked.
    pub async fn execute_with<F, Fut, T, E>(
        &self,
        op: F,
        overrides: &RetryOverrides,
    ) -> Result<Result<T, E>, ConfigError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let executor = self.with_overrides(overrides)?;
        Ok(executor.execute(op).await)
    }

    fn notify(&self, level: EventLevel, message: &str, event: ResilienceEvent) {
        emit(self.observer.as_ref(), level, message, event);
    }
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("observer", &self.observer)
            .finish()
    }
}

/// Builder for a [`RetryExecutor`].
#[derive(Debug)]
pub struct RetryExecutorBuilder {
    config: RetryConfig,
    clock: ArcClock,
    observer: Option<ArcObserver>,
}

impl RetryExecutorBuilder {
    /// Creates a builder using the tokio timer and no observer.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            clock: Arc::new(TokioClock),
            observer: None,
        }
    }

    /// Sets the clock.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Sets a shared clock.
    pub fn with_arc_clock(mut self, clock: ArcClock) -> Self {
        self.clock = clock;
        self
    }

    /// Attaches an observer.
    pub fn with_observer<O: Observer + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Attaches a shared observer.
    pub fn with_arc_observer(mut self, observer: ArcObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Validates the configuration and builds the executor.
    pub fn build(self) -> ConfigResult<RetryExecutor> {
        self.config.validate()?;
        Ok(RetryExecutor {
            config: self.config,
            clock: self.clock,
            observer: self.observer,
        })
    }
}
