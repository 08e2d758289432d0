//! Core types shared by every component.
//!
//! - [`error`] - The failure taxonomy and the `Retryable` contract
//! - [`clock`] - Injectable time sources
//! - [`observer`] - The observability sink and its events

pub mod clock;
pub mod error;
pub mod observer;
pub(crate) mod serde_millis;

pub use clock::{ArcClock, Clock, ManualClock, TokioClock};
pub use error::{
    ConfigError, ConfigResult, Failure, FailureKind, FailureResult, Retryable, StructuredFailure,
};
pub use observer::{ArcObserver, EventLevel, Observer, ResilienceEvent};
