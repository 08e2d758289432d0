//! Test doubles for code built on the limiter and the executor.
//!
//! [`MockDependency`] replays a script of outcomes so that failure sequences
//! can be driven deterministically, and [`RecordingObserver`] captures every
//! event it receives.
//!
//! # Examples
//!
//! ```rust
//! use signalgate::mock::MockDependency;
//! use signalgate::Failure;
//!
//! let trends = MockDependency::new("trends-api")
//!     .then_fail(Failure::network("connection reset", None))
//!     .then_succeed(vec!["espresso", "pour over"]);
//!
//! assert_eq!(trends.name(), "trends-api");
//! assert_eq!(trends.invocations(), 0);
//! ```

use crate::core::{EventLevel, Failure, Observer, ResilienceEvent};

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A scripted stand-in for an external dependency.
///
/// Each [`call`](Self::call) consumes the next scripted outcome. Once the
/// script runs out, calls fail with the [`always_fail`](Self::always_fail)
/// failure, or with an unclassified failure if none was set.
#[derive(Debug)]
pub struct MockDependency<T> {
    /// Name of the simulated dependency.
    name: String,
    /// Outcomes still to be replayed.
    script: Mutex<VecDeque<Result<T, Failure>>>,
    /// Outcome once the script is exhausted.
    fallback: Option<Failure>,
    /// Counter for calls made.
    invocations: AtomicU64,
}

impl<T> MockDependency<T> {
    /// Creates a dependency with an empty script.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            invocations: AtomicU64::new(0),
        }
    }

    /// Appends a failing outcome.
    pub fn then_fail(self, failure: Failure) -> Self {
        self.push(Err(failure));
        self
    }

    /// Appends a successful outcome.
    pub fn then_succeed(self, value: T) -> Self {
        self.push(Ok(value));
        self
    }

    /// Fails with `failure` once the script is exhausted.
    pub fn always_fail(mut self, failure: Failure) -> Self {
        self.fallback = Some(failure);
        self
    }

    /// Returns the dependency name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of calls made so far.
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Returns the number of scripted outcomes not yet replayed.
    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Simulates one call.
    ///
    /// The outcome is taken when `call` is invoked, not when the returned
    /// future is polled.
    pub fn call(&self) -> impl Future<Output = Result<T, Failure>> {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        let outcome = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| {
                Err(self.fallback.clone().unwrap_or_else(|| {
                    Failure::unclassified(format!("no scripted outcome left for '{}'", self.name))
                }))
            });
        std::future::ready(outcome)
    }

    fn push(&self, outcome: Result<T, Failure>) {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(outcome);
    }
}

/// One event captured by a [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Level the event was reported at.
    pub level: EventLevel,
    /// Human-readable message.
    pub message: String,
    /// The event itself.
    pub event: ResilienceEvent,
}

/// An observer that keeps every event it receives.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    records: Mutex<Vec<Record>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn records(&self) -> Vec<Record> {
        self.lock().clone()
    }

    /// Returns the names of the recorded events, in order.
    pub fn event_names(&self) -> Vec<&'static str> {
        self.lock().iter().map(|record| record.event.name()).collect()
    }

    /// Discards everything recorded so far.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn record(&self, level: EventLevel, message: &str, event: &ResilienceEvent) {
        self.lock().push(Record {
            level,
            message: message.to_string(),
            event: event.clone(),
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Record>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Observer for RecordingObserver {
    fn debug(&self, message: &str, event: &ResilienceEvent) {
        self.record(EventLevel::Debug, message, event);
    }

    fn info(&self, message: &str, event: &ResilienceEvent) {
        self.record(EventLevel::Info, message, event);
    }

    fn warn(&self, message: &str, event: &ResilienceEvent) {
        self.record(EventLevel::Warn, message, event);
    }

    fn error(&self, message: &str, event: &ResilienceEvent) {
        self.record(EventLevel::Error, message, event);
    }
}
