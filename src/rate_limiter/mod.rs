//! Rate limiting with an integrated circuit breaker.
//!
//! Each [`RateLimiter`] guards one dependency. A token bucket paces how often
//! operations may start, and a circuit breaker stops calling the dependency
//! once it keeps failing.
//!
//! ## Circuit phases
//!
//! - **Closed**: Calls pass through once a token is available.
//! - **Open**: Calls are rejected without running until the cool-down ends.
//! - **Half-Open**: The next call probes the dependency.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use signalgate::rate_limiter::{RateLimiter, RateLimiterConfig};
//! use std::time::Duration;
//!
//! let config = RateLimiterConfig::new(120.0)
//!     .with_name("reddit")
//!     .with_failure_threshold(3)
//!     .with_reset_timeout(Duration::from_secs(30));
//!
//! let limiter = RateLimiter::new(config)?;
//! ```

mod config;
mod limiter;
mod state;

pub use config::RateLimiterConfig;
pub use limiter::{RateLimiter, RateLimiterBuilder};
pub use state::{CircuitPhase, LimiterMetrics, LimiterStats};
