//! Failure taxonomy shared by the rate limiter and the retry executor.
//!
//! Every failure carries an explicit retryability verdict that is decided
//! where the failure is raised. Neither the limiter nor the executor looks at
//! messages or kinds to decide what to do; they only ask [`Retryable`].

use serde::{Deserialize, Serialize};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The classification of a [`Failure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The protected resource refused the call because of its rate budget,
    /// or the local circuit breaker is open. Always retryable.
    RateLimited {
        /// How long the caller should wait before trying again, if known.
        retry_after: Option<Duration>,
    },

    /// Transport or upstream failure. Retryable unless marked permanent.
    Network {
        /// HTTP status code, when the failure came from a response.
        status_code: Option<u16>,
    },

    /// Credentials were rejected. Never retryable.
    Authentication,

    /// The request itself is invalid. Never retryable.
    Validation,

    /// Anything else. Retryable only when declared so.
    Unclassified,
}

impl FailureKind {
    /// Returns the stable, snake_case name used in structured output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Network { .. } => "network",
            Self::Authentication => "authentication",
            Self::Validation => "validation",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited { .. } => f.write_str("rate limited"),
            Self::Network {
                status_code: Some(code),
            } => write!(f, "network failure (status {code})"),
            Self::Network { status_code: None } => f.write_str("network failure"),
            Self::Authentication => f.write_str("authentication failed"),
            Self::Validation => f.write_str("validation failed"),
            Self::Unclassified => f.write_str("failure"),
        }
    }
}

/// A classified failure raised by, or on behalf of, a protected resource.
///
/// The retryability of a failure is fixed by its kind for rate-limit,
/// authentication and validation failures. Network and unclassified failures
/// carry whatever verdict their author declared.
///
/// # Example
///
/// ```rust
/// use signalgate::core::{Failure, Retryable};
///
/// let err = Failure::network("connection reset", None).with_source("trends-api");
/// assert!(err.is_retryable());
///
/// let err = Failure::authentication("invalid API key");
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct Failure {
    kind: FailureKind,
    message: String,
    resource: Option<String>,
    retryable: bool,
    #[source]
    cause: Option<Box<Failure>>,
    stack: Option<String>,
}

impl Failure {
    fn new(kind: FailureKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            resource: None,
            retryable,
            cause: None,
            stack: capture_stack(),
        }
    }

    /// Creates a rate-limit failure.
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::new(FailureKind::RateLimited { retry_after }, message, true)
    }

    /// Creates a retryable network failure.
    pub fn network(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::new(FailureKind::Network { status_code }, message, true)
    }

    /// Creates an authentication failure.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Authentication, message, false)
    }

    /// Creates a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Validation, message, false)
    }

    /// Creates a non-retryable unclassified failure.
    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unclassified, message, false)
    }

    /// Creates the failure a rate limiter returns while its circuit is open.
    pub fn circuit_open(resource: impl Into<String>, retry_after: Duration) -> Self {
        let resource = resource.into();
        // Rejections are on the fail-fast path and never capture a stack.
        Self {
            kind: FailureKind::RateLimited {
                retry_after: Some(retry_after),
            },
            message: format!(
                "circuit breaker open for '{}'; retry in {}ms",
                resource,
                retry_after.as_millis()
            ),
            resource: Some(resource),
            retryable: true,
            cause: None,
            stack: None,
        }
    }

    /// Classifies an HTTP response status.
    ///
    /// - 429 is a rate-limit failure.
    /// - 401 and 403 are authentication failures.
    /// - 400 and 422 are validation failures.
    /// - 408 and 5xx are retryable network failures.
    /// - Any other status is a permanent network failure.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        match status_code {
            429 => Self::rate_limited(message, None),
            401 | 403 => Self::authentication(message),
            400 | 422 => Self::validation(message),
            408 | 500..=599 => Self::network(message, Some(status_code)),
            _ => Self::network(message, Some(status_code)).permanent(),
        }
    }

    /// Sets the name of the protected resource this failure came from.
    pub fn with_source(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Attaches the failure that caused this one.
    pub fn with_cause(mut self, cause: Failure) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Overrides the retryability verdict of a network or unclassified
    /// failure. Other kinds keep the verdict their kind dictates.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        if matches!(
            self.kind,
            FailureKind::Network { .. } | FailureKind::Unclassified
        ) {
            self.retryable = retryable;
        }
        self
    }

    /// Marks a network or unclassified failure as permanent.
    pub fn permanent(self) -> Self {
        self.with_retryable(false)
    }

    /// Returns the kind of this failure.
    pub fn kind(&self) -> &FailureKind {
        &self.kind
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the name of the protected resource, if known.
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Returns the nested cause, if any.
    pub fn cause(&self) -> Option<&Failure> {
        self.cause.as_deref()
    }

    /// Returns the stack captured when the failure was created, if
    /// backtraces are enabled for the process.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// Returns the wait hint of a rate-limit failure.
    pub fn retry_after(&self) -> Option<Duration> {
        match self.kind {
            FailureKind::RateLimited { retry_after } => retry_after,
            _ => None,
        }
    }

    /// Returns the status code of a network failure.
    pub fn status_code(&self) -> Option<u16> {
        match self.kind {
            FailureKind::Network { status_code } => status_code,
            _ => None,
        }
    }

    /// Projects the failure into a serializable form for logging.
    pub fn to_structured(&self) -> StructuredFailure {
        StructuredFailure {
            kind: self.kind.name().to_string(),
            message: self.message.clone(),
            source: self.resource.clone(),
            retryable: self.retryable,
            cause: self
                .cause
                .as_ref()
                .map(|cause| Box::new(cause.to_structured())),
            stack: self.stack.clone(),
            retry_after_ms: self.retry_after().map(|d| d.as_millis() as u64),
            status_code: self.status_code(),
        }
    }

    /// Rebuilds a failure from its structured projection.
    ///
    /// Unknown kinds are read as unclassified. The kind's own retryability
    /// rule wins over the projected flag for rate-limit, authentication and
    /// validation failures.
    pub fn from_structured(structured: StructuredFailure) -> Self {
        let kind = match structured.kind.as_str() {
            "rate_limited" => FailureKind::RateLimited {
                retry_after: structured.retry_after_ms.map(Duration::from_millis),
            },
            "network" => FailureKind::Network {
                status_code: structured.status_code,
            },
            "authentication" => FailureKind::Authentication,
            "validation" => FailureKind::Validation,
            _ => FailureKind::Unclassified,
        };
        let retryable = match kind {
            FailureKind::RateLimited { .. } => true,
            FailureKind::Authentication | FailureKind::Validation => false,
            FailureKind::Network { .. } | FailureKind::Unclassified => structured.retryable,
        };

        Self {
            kind,
            message: structured.message,
            resource: structured.source,
            retryable,
            cause: structured
                .cause
                .map(|cause| Box::new(Self::from_structured(*cause))),
            stack: structured.stack,
        }
    }
}

impl From<StructuredFailure> for Failure {
    fn from(structured: StructuredFailure) -> Self {
        Self::from_structured(structured)
    }
}

fn capture_stack() -> Option<String> {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

/// Serializable projection of a [`Failure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredFailure {
    /// Kind name, e.g. `"rate_limited"`.
    pub kind: String,

    /// Human-readable message.
    pub message: String,

    /// Name of the protected resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Retryability verdict.
    pub retryable: bool,

    /// Nested cause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<StructuredFailure>>,

    /// Captured stack, when backtraces are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    /// Wait hint of a rate-limit failure, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,

    /// Status code of a network failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// Retryability verdict of an operation error.
///
/// Error types that do not override [`Retryable::is_retryable`] are treated
/// as non-retryable.
pub trait Retryable {
    /// Returns `true` if the failed operation may be re-attempted unchanged.
    fn is_retryable(&self) -> bool {
        false
    }
}

impl Retryable for Failure {
    fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl Retryable for std::io::Error {}

impl<T: Retryable + ?Sized> Retryable for Box<T> {
    fn is_retryable(&self) -> bool {
        (**self).is_retryable()
    }
}

impl<T: Retryable + ?Sized> Retryable for Arc<T> {
    fn is_retryable(&self) -> bool {
        (**self).is_retryable()
    }
}

/// Error returned when a limiter or executor is built from invalid settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A setting is out of its allowed range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending setting.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an `Invalid` error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// Returns the name of the offending setting.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Invalid { field, .. } => field,
        }
    }
}

/// A specialized `Result` type for protected operations.
pub type FailureResult<T> = Result<T, Failure>;

/// A specialized `Result` type for construction.
pub type ConfigResult<T> = Result<T, ConfigError>;
