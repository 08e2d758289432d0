//! Token-bucket admission with an integrated circuit breaker.

use crate::core::observer::emit;
use crate::core::{
    ArcClock, ArcObserver, Clock, ConfigResult, EventLevel, Failure, Observer, ResilienceEvent,
    TokioClock,
};
use crate::rate_limiter::config::RateLimiterConfig;
use crate::rate_limiter::state::{
    BreakerState, CircuitPhase, LimiterMetrics, LimiterStats, TokenBucket,
};

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Shortest wait a queued caller sleeps before re-polling.
const MIN_WAIT: Duration = Duration::from_millis(1);

type Notice = (EventLevel, &'static str, ResilienceEvent);

/// Admission controller for one protected dependency.
///
/// Combines a token bucket, which paces how often operations may start, with
/// a circuit breaker, which stops calling the dependency after
/// `failure_threshold` failures in a row.
///
/// Callers waiting for a token are served in arrival order. A caller that
/// arrives while others are queued waits behind them even if a token is
/// available.
///
/// Construct one limiter per dependency and share it through an `Arc`.
///
/// # Example
///
/// ```rust,ignore
/// use signalgate::{Failure, RateLimiter, RateLimiterConfig};
///
/// let limiter = RateLimiter::new(RateLimiterConfig::new(60.0).with_name("trends-api"))?;
///
/// let body = limiter
///     .execute(|| async { client.fetch_trends("espresso").await })
///     .await?;
/// ```
pub struct RateLimiter {
    config: RateLimiterConfig,
    state: Mutex<LimiterState>,
    clock: ArcClock,
    observer: Option<ArcObserver>,
}

#[derive(Debug)]
struct LimiterState {
    bucket: TokenBucket,
    breaker: BreakerState,
    consecutive_failures: u32,
    waiters: VecDeque<u64>,
    next_ticket: u64,
    metrics: LimiterMetrics,
}

enum Admission {
    Granted,
    Wait(Duration),
    Rejected(Failure),
}

/// Place in the waiter queue. Leaves the queue when dropped, so a caller
/// that gives up does not hold back the ones behind it.
struct Ticket<'a> {
    limiter: &'a RateLimiter,
    id: u64,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        let id = self.id;
        self.limiter.lock().waiters.retain(|waiting| *waiting != id);
    }
}

impl RateLimiter {
    /// Creates a limiter driven by the tokio timer, without an observer.
    pub fn new(config: RateLimiterConfig) -> ConfigResult<Self> {
        Self::builder(config).build()
    }

    /// Starts building a limiter.
    pub fn builder(config: RateLimiterConfig) -> RateLimiterBuilder {
        RateLimiterBuilder::new(config)
    }

    /// Returns the resource name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Returns the current circuit phase.
    pub fn phase(&self) -> CircuitPhase {
        self.lock().breaker.phase()
    }

    /// Runs `op` once admission is granted.
    ///
    /// Fails with a rate-limit [`Failure`] without invoking `op` when the
    /// circuit is open. Any error returned by `op` is passed back unchanged
    /// after the circuit bookkeeping is updated.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<Failure>,
    {
        self.admit().await.map_err(E::from)?;

        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    /// Returns a snapshot of the bucket, the circuit and the counters.
    pub fn stats(&self) -> LimiterStats {
        let now = self.clock.now();
        let state = self.lock();
        LimiterStats {
            name: self.config.name.clone(),
            available_tokens: state.bucket.available_at(now),
            capacity: state.bucket.capacity(),
            rate_per_period: self.config.rate_per_period,
            period: self.config.period,
            phase: state.breaker.phase(),
            consecutive_failures: state.consecutive_failures,
            pending_waiters: state.waiters.len(),
            metrics: state.metrics.clone(),
        }
    }

    /// Forces the circuit closed and clears the failure count.
    pub fn reset_circuit_breaker(&self) {
        let previous_phase = {
            let mut state = self.lock();
            let previous = state.breaker.phase();
            state.breaker = BreakerState::Closed;
            state.consecutive_failures = 0;
            previous
        };

        self.publish(vec![(
            EventLevel::Info,
            "Circuit breaker reset",
            ResilienceEvent::CircuitReset {
                resource: self.config.name.clone(),
                previous_phase,
            },
        )]);
    }

    /// Waits for a token, or fails if the circuit is open.
    async fn admit(&self) -> Result<(), Failure> {
        let mut ticket: Option<Ticket<'_>> = None;
        let mut throttled = false;
        self.lock().metrics.record_request();

        loop {
            let now = self.clock.now();
            let mut notices = Vec::new();

            let admission = {
                let mut state = self.lock();
                match self.circuit_gate(&mut state, now, &mut notices) {
                    Some(rejection) => Admission::Rejected(rejection),
                    None => {
                        state.bucket.refill(now);
                        let ahead = match &ticket {
                            Some(ticket) => state
                                .waiters
                                .iter()
                                .position(|waiting| *waiting == ticket.id)
                                .unwrap_or(0),
                            None => state.waiters.len(),
                        };

                        if ahead == 0 && state.bucket.try_take() {
                            if let Some(ticket) = &ticket {
                                state.waiters.retain(|waiting| *waiting != ticket.id);
                            }
                            Admission::Granted
                        } else {
                            if ticket.is_none() {
                                let id = state.next_ticket;
                                state.next_ticket += 1;
                                state.waiters.push_back(id);
                                ticket = Some(Ticket { limiter: self, id });
                            }
                            let wait = state.bucket.time_until(ahead as f64 + 1.0).max(MIN_WAIT);
                            if !throttled {
                                throttled = true;
                                state.metrics.record_throttled();
                                notices.push((
                                    EventLevel::Debug,
                                    "Waiting for rate limit token",
                                    ResilienceEvent::Throttled {
                                        resource: self.config.name.clone(),
                                        wait_ms: wait.as_millis() as u64,
                                        pending_waiters: state.waiters.len(),
                                    },
                                ));
                            }
                            Admission::Wait(wait)
                        }
                    }
                }
            };

            self.publish(notices);

            match admission {
                Admission::Granted => return Ok(()),
                Admission::Rejected(rejection) => return Err(rejection),
                Admission::Wait(wait) => self.clock.sleep(wait).await,
            }
        }
    }

    /// Rejects the call while the circuit is open; moves an expired open
    /// circuit to half-open.
    fn circuit_gate(
        &self,
        state: &mut LimiterState,
        now: Instant,
        notices: &mut Vec<Notice>,
    ) -> Option<Failure> {
        let BreakerState::Open { opened_at } = state.breaker else {
            return None;
        };

        let elapsed = now.saturating_duration_since(opened_at);
        if elapsed >= self.config.reset_timeout {
            state.breaker = BreakerState::HalfOpen;
            notices.push((
                EventLevel::Debug,
                "Circuit half-open, probing resource",
                ResilienceEvent::CircuitHalfOpen {
                    resource: self.config.name.clone(),
                },
            ));
            return None;
        }

        let retry_after = self.config.reset_timeout - elapsed;
        state.metrics.record_rejected();
        notices.push((
            EventLevel::Debug,
            "Circuit open, call rejected",
            ResilienceEvent::Rejected {
                resource: self.config.name.clone(),
                retry_after_ms: retry_after.as_millis() as u64,
            },
        ));
        Some(Failure::circuit_open(self.config.name.clone(), retry_after))
    }

    fn record_success(&self) {
        let mut notices = Vec::new();
        {
            let mut state = self.lock();
            state.metrics.record_success();
            match state.breaker {
                BreakerState::HalfOpen => {
                    state.breaker = BreakerState::Closed;
                    state.consecutive_failures = 0;
                    state.metrics.record_closed();
                    notices.push((
                        EventLevel::Info,
                        "Circuit closed",
                        ResilienceEvent::CircuitClosed {
                            resource: self.config.name.clone(),
                        },
                    ));
                }
                BreakerState::Closed => state.consecutive_failures = 0,
                // A call admitted before the circuit opened; the open circuit
                // keeps its cool-down.
                BreakerState::Open { .. } => {}
            }
        }
        self.publish(notices);
    }

    fn record_failure(&self) {
        let now = self.clock.now();
        let mut notices = Vec::new();
        {
            let mut state = self.lock();
            state.metrics.record_failure();
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);

            let trips = match state.breaker {
                BreakerState::HalfOpen => true,
                BreakerState::Closed => {
                    state.consecutive_failures >= self.config.failure_threshold
                }
                BreakerState::Open { .. } => false,
            };

            if trips {
                state.breaker = BreakerState::Open { opened_at: now };
                state.metrics.record_opened();
                notices.push((
                    EventLevel::Warn,
                    "Circuit opened",
                    ResilienceEvent::CircuitOpened {
                        resource: self.config.name.clone(),
                        consecutive_failures: state.consecutive_failures,
                        reset_timeout_ms: self.config.reset_timeout.as_millis() as u64,
                    },
                ));
            }
        }
        self.publish(notices);
    }

    fn publish(&self, notices: Vec<Notice>) {
        for (level, message, event) in notices {
            emit(self.observer.as_ref(), level, message, event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("state", &*self.lock())
            .field("clock", &self.clock)
            .field("observer", &self.observer)
            .finish()
    }
}

/// Builder for a [`RateLimiter`].
#[derive(Debug)]
pub struct RateLimiterBuilder {
    config: RateLimiterConfig,
    clock: ArcClock,
    observer: Option<ArcObserver>,
}

impl RateLimiterBuilder {
    /// Creates a builder using the tokio timer and no observer.
    pub fn new(config: RateLimiterConfig) -> Self {
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

    /// Validates the configuration and builds the limiter with a full
    /// bucket and a closed circuit.
    pub fn build(self) -> ConfigResult<RateLimiter> {
        self.config.validate()?;

        let bucket = TokenBucket::new(
            self.config.effective_burst_size(),
            self.config.refill_per_second(),
            self.clock.now(),
        );

        Ok(RateLimiter {
            state: Mutex::new(LimiterState {
                bucket,
                breaker: BreakerState::Closed,
                consecutive_failures: 0,
                waiters: VecDeque::new(),
                next_ticket: 0,
                metrics: LimiterMetrics::default(),
            }),
            config: self.config,
            clock: self.clock,
            observer: self.observer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FailureKind, ManualClock};
    use crate::mock::{MockDependency, RecordingObserver};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn manual_limiter(config: RateLimiterConfig) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::new();
        let limiter = RateLimiter::builder(config)
            .with_clock(clock.clone())
            .build()
            .unwrap();
        (limiter, clock)
    }

    async fn ok(limiter: &RateLimiter) -> Result<u32, Failure> {
        limiter.execute(|| async { Ok::<_, Failure>(7) }).await
    }

    async fn fail(limiter: &RateLimiter) -> Result<u32, Failure> {
        limiter
            .execute(|| async { Err::<u32, _>(Failure::network("upstream 502", Some(502))) })
            .await
    }

    #[test]
    fn test_construction_rejects_invalid_rate() {
        for rate in [0.0, -5.0] {
            let err = RateLimiter::new(RateLimiterConfig::new(rate)).unwrap_err();
            assert_eq!(err.field(), "rate_per_period");
        }
    }

    #[test]
    fn test_default_capacity() {
        for (rate, expected) in [(30.0, 10), (60.0, 10), (120.0, 20), (900.0, 150)] {
            let (limiter, _) = manual_limiter(RateLimiterConfig::new(rate));
            let stats = limiter.stats();
            assert_eq!(stats.capacity, expected);
            assert_eq!(stats.available_tokens, expected as f64);
        }
    }

    #[tokio::test]
    async fn test_burst_then_wait_one_token() {
        // 60 per minute: one token per second.
        let (limiter, clock) = manual_limiter(RateLimiterConfig::new(60.0).with_burst_size(2));

        assert_eq!(ok(&limiter).await.unwrap(), 7);
        assert_eq!(ok(&limiter).await.unwrap(), 7);
        assert_eq!(clock.total_slept(), Duration::ZERO);

        assert_eq!(ok(&limiter).await.unwrap(), 7);
        assert_eq!(clock.total_slept(), Duration::from_millis(1000));
        assert_eq!(limiter.stats().metrics.throttled_requests, 1);
        assert_eq!(limiter.stats().pending_waiters, 0);
    }

    #[tokio::test]
    async fn test_burst_size_calls_start_without_waiting() {
        let (limiter, clock) = manual_limiter(RateLimiterConfig::new(600.0).with_burst_size(5));

        for _ in 0..5 {
            ok(&limiter).await.unwrap();
        }
        assert_eq!(clock.total_slept(), Duration::ZERO);

        // 600 per minute refills a token every 100ms.
        ok(&limiter).await.unwrap();
        assert!(clock.total_slept() >= Duration::from_millis(100));
        assert!(clock.total_slept() < Duration::from_millis(110));
    }

    #[tokio::test]
    async fn test_sustained_rate_converges() {
        let (limiter, clock) = manual_limiter(RateLimiterConfig::new(600.0));

        // The first 100 ride the burst, the next 20 are paced at 10/s.
        for _ in 0..120 {
            ok(&limiter).await.unwrap();
        }
        let slept = clock.total_slept();
        assert!(slept >= Duration::from_millis(2000), "slept {slept:?}");
        assert!(slept <= Duration::from_millis(2050), "slept {slept:?}");
    }

    #[tokio::test]
    async fn test_configurable_period() {
        let (limiter, clock) =
            manual_limiter(RateLimiterConfig::per_second(10.0).with_burst_size(1));

        ok(&limiter).await.unwrap();
        ok(&limiter).await.unwrap();
        assert_eq!(clock.total_slept(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_partial_refill_shortens_wait() {
        let (limiter, clock) = manual_limiter(RateLimiterConfig::new(60.0).with_burst_size(1));

        ok(&limiter).await.unwrap();
        clock.advance(Duration::from_millis(400));
        ok(&limiter).await.unwrap();

        assert_eq!(clock.sleeps(), vec![Duration::from_millis(600)]);
    }

    #[tokio::test]
    async fn test_circuit_opens_and_fails_fast() {
        let (limiter, _) =
            manual_limiter(RateLimiterConfig::new(600.0).with_failure_threshold(3));
        let invocations = AtomicU32::new(0);

        for _ in 0..3 {
            let result = limiter
                .execute(|| async {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Failure::network("timeout", None))
                })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(limiter.phase(), CircuitPhase::Open);

        let rejected = limiter
            .execute(|| async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Failure>(())
            })
            .await
            .unwrap_err();

        assert_eq!(invocations.load(Ordering::SeqCst), 3);
        assert!(rejected.to_string().contains("circuit breaker open"));
        assert!(matches!(rejected.kind(), FailureKind::RateLimited { .. }));
        assert_eq!(rejected.retry_after(), Some(Duration::from_secs(60)));
        assert_eq!(rejected.resource(), Some("default"));

        let stats = limiter.stats();
        assert_eq!(stats.consecutive_failures, 3);
        assert_eq!(stats.metrics.rejected_requests, 1);
        assert_eq!(stats.metrics.times_opened, 1);
    }

    #[tokio::test]
    async fn test_rejection_reports_remaining_cool_down() {
        let (limiter, clock) = manual_limiter(
            RateLimiterConfig::new(600.0)
                .with_failure_threshold(1)
                .with_reset_timeout(Duration::from_secs(10)),
        );

        fail(&limiter).await.unwrap_err();
        clock.advance(Duration::from_secs(4));

        let rejected = ok(&limiter).await.unwrap_err();
        assert_eq!(rejected.retry_after(), Some(Duration::from_secs(6)));
    }

    #[tokio::test]
    async fn test_half_open_success_closes_circuit() {
        let observer = Arc::new(RecordingObserver::new());
        let clock = ManualClock::new();
        let limiter = RateLimiter::builder(
            RateLimiterConfig::new(600.0)
                .with_failure_threshold(2)
                .with_reset_timeout(Duration::from_secs(30)),
        )
        .with_clock(clock.clone())
        .with_arc_observer(observer.clone())
        .build()
        .unwrap();

        fail(&limiter).await.unwrap_err();
        fail(&limiter).await.unwrap_err();
        assert_eq!(limiter.phase(), CircuitPhase::Open);

        clock.advance(Duration::from_secs(30));
        assert_eq!(ok(&limiter).await.unwrap(), 7);

        let stats = limiter.stats();
        assert_eq!(stats.phase, CircuitPhase::Closed);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.metrics.times_closed, 1);

        assert_eq!(
            observer.event_names(),
            vec!["circuit_opened", "circuit_half_open", "circuit_closed"]
        );
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens_with_new_timestamp() {
        let (limiter, clock) = manual_limiter(
            RateLimiterConfig::new(600.0)
                .with_failure_threshold(3)
                .with_reset_timeout(Duration::from_secs(30)),
        );

        for _ in 0..3 {
            fail(&limiter).await.unwrap_err();
        }
        clock.advance(Duration::from_secs(30));

        let probe = fail(&limiter).await.unwrap_err();
        assert_eq!(probe.status_code(), Some(502));
        assert_eq!(limiter.phase(), CircuitPhase::Open);

        clock.advance(Duration::from_millis(29_999));
        assert!(ok(&limiter).await.is_err());

        clock.advance(Duration::from_millis(1));
        assert_eq!(ok(&limiter).await.unwrap(), 7);
        assert_eq!(limiter.phase(), CircuitPhase::Closed);
    }

    #[tokio::test]
    async fn test_success_clears_failure_streak() {
        let (limiter, _) =
            manual_limiter(RateLimiterConfig::new(600.0).with_failure_threshold(3));

        fail(&limiter).await.unwrap_err();
        fail(&limiter).await.unwrap_err();
        ok(&limiter).await.unwrap();
        assert_eq!(limiter.stats().consecutive_failures, 0);

        fail(&limiter).await.unwrap_err();
        fail(&limiter).await.unwrap_err();
        assert_eq!(limiter.phase(), CircuitPhase::Closed);
    }

    #[tokio::test]
    async fn test_reset_circuit_breaker() {
        let (limiter, _) =
            manual_limiter(RateLimiterConfig::new(600.0).with_failure_threshold(2));

        fail(&limiter).await.unwrap_err();
        limiter.reset_circuit_breaker();
        assert_eq!(limiter.stats().consecutive_failures, 0);

        fail(&limiter).await.unwrap_err();
        fail(&limiter).await.unwrap_err();
        assert_eq!(limiter.phase(), CircuitPhase::Open);

        limiter.reset_circuit_breaker();
        let stats = limiter.stats();
        assert_eq!(stats.phase, CircuitPhase::Closed);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(ok(&limiter).await.unwrap(), 7);
    }

    #[derive(Debug, PartialEq)]
    enum ScrapeError {
        Limited(String),
        Parse(&'static str),
    }

    impl From<Failure> for ScrapeError {
        fn from(failure: Failure) -> Self {
            Self::Limited(failure.to_string())
        }
    }

    #[tokio::test]
    async fn test_operation_errors_pass_through_unchanged() {
        let (limiter, _) =
            manual_limiter(RateLimiterConfig::new(600.0).with_failure_threshold(1));

        let err = limiter
            .execute(|| async { Err::<(), _>(ScrapeError::Parse("unexpected markup")) })
            .await
            .unwrap_err();
        assert_eq!(err, ScrapeError::Parse("unexpected markup"));

        let err = limiter
            .execute(|| async { Ok::<_, ScrapeError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Limited(message) if message.contains("circuit breaker open")));
    }

    #[tokio::test]
    async fn test_wraps_mock_dependency() {
        let (limiter, _) =
            manual_limiter(RateLimiterConfig::new(600.0).with_failure_threshold(2));
        let dependency = MockDependency::new("trends-api")
            .then_fail(Failure::network("reset", None))
            .then_fail(Failure::network("reset", None))
            .then_succeed("ok");

        assert!(limiter.execute(|| dependency.call()).await.is_err());
        assert!(limiter.execute(|| dependency.call()).await.is_err());
        assert!(limiter.execute(|| dependency.call()).await.is_err());
        assert_eq!(dependency.invocations(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_are_served_in_arrival_order() {
        let limiter = Arc::new(
            RateLimiter::new(RateLimiterConfig::new(60.0).with_burst_size(1)).unwrap(),
        );
        let order = Arc::new(Mutex::new(Vec::new()));
        ok(&limiter).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let task_limiter = limiter.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                task_limiter
                    .execute(|| async {
                        order.lock().unwrap().push(i);
                        Ok::<_, Failure>(())
                    })
                    .await
            }));
            while limiter.stats().pending_waiters < i + 1 {
                tokio::task::yield_now().await;
            }
        }

        let start = Instant::now();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
        assert!(Instant::now() - start >= Duration::from_secs(4));
        assert_eq!(limiter.stats().pending_waiters, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_waiter_leaves_queue() {
        let limiter = Arc::new(
            RateLimiter::new(RateLimiterConfig::new(60.0).with_burst_size(1)).unwrap(),
        );
        ok(&limiter).await.unwrap();

        let waiting = {
            let limiter = limiter.clone();
            tokio::spawn(async move { ok(&limiter).await })
        };
        while limiter.stats().pending_waiters == 0 {
            tokio::task::yield_now().await;
        }

        waiting.abort();
        assert!(waiting.await.unwrap_err().is_cancelled());
        assert_eq!(limiter.stats().pending_waiters, 0);

        let start = Instant::now();
        ok(&limiter).await.unwrap();
        assert!(Instant::now() - start <= Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_rejected_when_circuit_opens_meanwhile() {
        let limiter = Arc::new(
            RateLimiter::new(
                RateLimiterConfig::new(60.0)
                    .with_burst_size(1)
                    .with_failure_threshold(1),
            )
            .unwrap(),
        );

        let failing = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter
                    .execute(|| async {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        Err::<(), _>(Failure::network("reset", None))
                    })
                    .await
            })
        };
        while limiter.stats().available_tokens >= 1.0 {
            tokio::task::yield_now().await;
        }

        let waiter = limiter.execute(|| async { Ok::<_, Failure>(()) }).await;

        assert!(failing.await.unwrap().is_err());
        let rejected = waiter.unwrap_err();
        assert!(rejected.to_string().contains("circuit breaker open"));
        assert_eq!(limiter.stats().pending_waiters, 0);
    }

    #[test]
    fn test_stats_serialize() {
        let (limiter, _) = manual_limiter(RateLimiterConfig::new(60.0).with_name("reddit"));
        let value = serde_json::to_value(limiter.stats()).unwrap();

        assert_eq!(value["name"], "reddit");
        assert_eq!(value["phase"], "closed");
        assert_eq!(value["capacity"], 10);
        assert_eq!(value["period_ms"], 60_000);
        assert_eq!(value["pending_waiters"], 0);
        assert_eq!(value["metrics"]["total_requests"], 0);
    }
}
