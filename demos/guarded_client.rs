//! Guarded client example demonstrating the resilience stack.
//!
//! This example shows how to:
//! - Share one rate limiter per dependency
//! - Retry transient failures with backoff
//! - Watch the circuit open on a failing dependency
//! - Report limiter statistics
//!
//! Run with: cargo run --example guarded_client
//! Set `RUST_LOG=signalgate=debug` to see every resilience event.

use signalgate::mock::MockDependency;
use signalgate::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct ConsoleObserver;

impl Observer for ConsoleObserver {
    fn warn(&self, message: &str, event: &ResilienceEvent) {
        println!("  [warn] {message} ({})", event.name());
    }

    fn error(&self, message: &str, event: &ResilienceEvent) {
        println!("  [error] {message} ({})", event.name());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("signalgate=info")),
        )
        .init();

    println!("=== Guarded Client Example ===\n");

    // A flaky trends feed: two resets, then a result
    let trends = MockDependency::new("trends-api")
        .then_fail(Failure::network("connection reset", None))
        .then_fail(Failure::from_status(503, "service unavailable"))
        .then_succeed(vec!["cold brew", "matcha"]);

    let trends_limiter = Arc::new(
        RateLimiter::builder(
            RateLimiterConfig::per_second(5.0)
                .with_name("trends-api")
                .with_burst_size(2),
        )
        .with_observer(ConsoleObserver)
        .build()?,
    );
    let retry = RetryExecutor::builder(
        RetryConfig::new()
            .with_max_retries(3)
            .with_base_delay(Duration::from_millis(50)),
    )
    .with_observer(ConsoleObserver)
    .build()?;

    let guard = Guard::new(trends_limiter.clone(), retry.clone());
    let topics = guard.call(|| trends.call()).await?;
    println!("Trending topics after {} calls: {:?}\n", trends.invocations(), topics);

    // A dependency that keeps failing trips the breaker
    let reddit: MockDependency<()> = MockDependency::new("reddit")
        .always_fail(Failure::from_status(502, "bad gateway").with_source("reddit"));
    let reddit_limiter = Arc::new(
        RateLimiter::builder(
            RateLimiterConfig::per_second(20.0)
                .with_name("reddit")
                .with_failure_threshold(3)
                .with_reset_timeout(Duration::from_secs(30)),
        )
        .with_observer(ConsoleObserver)
        .build()?,
    );
    let guard = Guard::new(reddit_limiter.clone(), retry);

    match guard.call(|| reddit.call()).await {
        Ok(()) => println!("Unexpected success"),
        Err(err) => println!("Gave up: {err}"),
    }
    println!("Reddit was invoked {} times\n", reddit.invocations());

    // Authentication failures are never retried
    let generator: MockDependency<String> = MockDependency::new("persona-generator")
        .then_fail(Failure::authentication("invalid API key"));
    let no_retry = RetryExecutor::new(RetryConfig::default())?;
    if let Err(err) = no_retry.execute(|| generator.call()).await {
        println!(
            "Generator failed after {} call: {}\n",
            generator.invocations(),
            describe(&err)
        );
    }

    for limiter in [&trends_limiter, &reddit_limiter] {
        let stats = limiter.stats();
        println!("Limiter '{}':", stats.name);
        println!("  Phase: {}", stats.phase.name());
        println!("  Tokens: {:.1}/{}", stats.available_tokens, stats.capacity);
        println!(
            "  Metrics: {} total, {} success, {} failed, {} rejected, {} throttled",
            stats.metrics.total_requests,
            stats.metrics.successful_requests,
            stats.metrics.failed_requests,
            stats.metrics.rejected_requests,
            stats.metrics.throttled_requests
        );
    }

    println!("\nResetting the reddit circuit breaker");
    reddit_limiter.reset_circuit_breaker();
    println!("  Phase: {}", reddit_limiter.phase().name());

    Ok(())
}

fn describe(failure: &Failure) -> String {
    let structured = failure.to_structured();
    format!(
        "kind={} retryable={} message={:?}",
        structured.kind, structured.retryable, structured.message
    )
}
