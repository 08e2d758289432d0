//! Observability sink and the events the core reports through it.
//!
//! Every event is also emitted as a `tracing` event under the
//! `signalgate::resilience` target, whether or not an observer is attached.

use crate::rate_limiter::CircuitPhase;

use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;

/// Severity of a reported event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    /// Routine bookkeeping.
    Debug,
    /// Recovery and operator actions.
    Info,
    /// Degradation that callers may feel.
    Warn,
    /// A call finally failed.
    Error,
}

/// Something the limiter or the executor did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ResilienceEvent {
    /// A caller has to wait for the bucket to refill.
    Throttled {
        /// Protected resource.
        resource: String,
        /// Computed wait before the next admission check.
        wait_ms: u64,
        /// Callers queued for a token, including this one.
        pending_waiters: usize,
    },

    /// A call was refused because the circuit is open.
    Rejected {
        /// Protected resource.
        resource: String,
        /// Remaining cool-down.
        retry_after_ms: u64,
    },

    /// The circuit opened.
    CircuitOpened {
        /// Protected resource.
        resource: String,
        /// Failures in a row that tripped the breaker.
        consecutive_failures: u32,
        /// Cool-down before the next probe.
        reset_timeout_ms: u64,
    },

    /// The cool-down elapsed and the next call probes the resource.
    CircuitHalfOpen {
        /// Protected resource.
        resource: String,
    },

    /// A probe succeeded and the circuit closed.
    CircuitClosed {
        /// Protected resource.
        resource: String,
    },

    /// The circuit was reset by an operator.
    CircuitReset {
        /// Protected resource.
        resource: String,
        /// Phase before the reset.
        previous_phase: CircuitPhase,
    },

    /// A retryable failure will be re-attempted after a delay.
    RetryScheduled {
        /// Zero-based index of the attempt that failed.
        attempt: u32,
        /// Retry budget.
        max_retries: u32,
        /// Jittered delay before the next attempt.
        delay_ms: u64,
        /// Display form of the failure.
        error: String,
    },

    /// An operation succeeded after at least one retry.
    RetryRecovered {
        /// Total invocations, including the successful one.
        attempts: u32,
    },

    /// The retry budget is spent; the last failure is returned.
    RetriesExhausted {
        /// Total invocations.
        attempts: u32,
        /// Display form of the last failure.
        error: String,
    },

    /// A failure was returned without retrying.
    NotRetryable {
        /// Total invocations.
        attempts: u32,
        /// Display form of the failure.
        error: String,
    },
}

impl ResilienceEvent {
    /// Returns the event name used in structured output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Throttled { .. } => "throttled",
            Self::Rejected { .. } => "rejected",
            Self::CircuitOpened { .. } => "circuit_opened",
            Self::CircuitHalfOpen { .. } => "circuit_half_open",
            Self::CircuitClosed { .. } => "circuit_closed",
            Self::CircuitReset { .. } => "circuit_reset",
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::RetryRecovered { .. } => "retry_recovered",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::NotRetryable { .. } => "not_retryable",
        }
    }
}

/// An injected sink for resilience events.
///
/// All methods default to doing nothing, so an implementation only overrides
/// the levels it cares about. The core behaves identically with or without
/// an observer.
pub trait Observer: Send + Sync + Debug {
    /// Receives a debug-level event.
    fn debug(&self, _message: &str, _event: &ResilienceEvent) {}

    /// Receives an info-level event.
    fn info(&self, _message: &str, _event: &ResilienceEvent) {}

    /// Receives a warn-level event.
    fn warn(&self, _message: &str, _event: &ResilienceEvent) {}

    /// Receives an error-level event.
    fn error(&self, _message: &str, _event: &ResilienceEvent) {}
}

/// An observer shared between components.
pub type ArcObserver = Arc<dyn Observer>;

/// Reports an event to `tracing` and to the observer, if any.
pub(crate) fn emit(
    observer: Option<&ArcObserver>,
    level: EventLevel,
    message: &str,
    event: ResilienceEvent,
) {
    match level {
        EventLevel::Debug => tracing::debug!(
            target: "signalgate::resilience",
            event_type = event.name(),
            event = ?event,
            "{}",
            message
        ),
        EventLevel::Info => tracing::info!(
            target: "signalgate::resilience",
            event_type = event.name(),
            event = ?event,
            "{}",
            message
        ),
        EventLevel::Warn => tracing::warn!(
            target: "signalgate::resilience",
            event_type = event.name(),
            event = ?event,
            "{}",
            message
        ),
        EventLevel::Error => tracing::error!(
            target: "signalgate::resilience",
            event_type = event.name(),
            event = ?event,
            "{}",
            message
        ),
    }

    if let Some(observer) = observer {
        match level {
            EventLevel::Debug => observer.debug(message, &event),
            EventLevel::Info => observer.info(message, &event),
            EventLevel::Warn => observer.warn(message, &event),
            EventLevel::Error => observer.error(message, &event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingObserver;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = ResilienceEvent::Rejected {
            resource: "reddit".into(),
            retry_after_ms: 900,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "rejected");
        assert_eq!(value["retry_after_ms"], 900);
        assert_eq!(event.name(), "rejected");
    }

    #[test]
    fn test_emit_routes_by_level() {
        let observer = Arc::new(RecordingObserver::new());
        let handle: ArcObserver = observer.clone();

        emit(
            Some(&handle),
            EventLevel::Warn,
            "Circuit opened",
            ResilienceEvent::CircuitOpened {
                resource: "x".into(),
                consecutive_failures: 5,
                reset_timeout_ms: 1000,
            },
        );
        emit(
            None,
            EventLevel::Info,
            "ignored",
            ResilienceEvent::CircuitClosed {
                resource: "x".into(),
            },
        );

        let records = observer.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, EventLevel::Warn);
        assert_eq!(records[0].message, "Circuit opened");
        assert_eq!(records[0].event.name(), "circuit_opened");
    }
}
