//! Levee - self-tuning circuit breaker and concurrency limiter
//!
//! This crate provides an adaptive circuit breaker that watches the RED
//! signals of the calls it wraps:
//! - Request rate, error rate and latency, plus in-flight concurrency
//! - Fixed-memory time series with multi-horizon EWMA smoothing
//! - Three-state controller (Closed → Open → HalfOpen) driven by a
//!   composite health score instead of hand-tuned thresholds
//! - A warm-up front-end that sizes the sample window from observed
//!   throughput before the adaptive breaker takes over
//!
//! # Example
//!
//! ```rust
//! use levee::{Levee, Slo, State};
//! use std::time::Duration;
//!
//! let levee = Levee::new(Slo {
//!     success_rate: 0.99,
//!     timeout: Duration::from_secs(5),
//!     warmup: Duration::from_secs(1),
//! });
//!
//! // Execute with breaker protection
//! let (state, result) = levee.call(|| {
//!     // Your service call here
//!     Ok::<_, String>("success")
//! });
//!
//! if state == State::Open {
//!     println!("shedding load, upstream looks unhealthy");
//! }
//! # let _ = result;
//! ```

use std::fmt;
use std::time::Duration;

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod errors;
pub mod facade;
pub mod metrics;
pub mod series;
pub mod warmup;

mod inflight;

pub use builder::LeveeBuilder;
pub use callbacks::Callbacks;
pub use circuit::CircuitBreaker;
pub use errors::CircuitError;
pub use facade::Levee;
pub use metrics::Metrics;
pub use series::TimeSeries;
pub use warmup::WarmupBreaker;

/// Breaker state, returned with every admission verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Warming up: admitting and measuring, window not yet sized
    Init,
    /// Normal operation: admit everything, watch the health score
    Closed,
    /// Refusing admission until the cooldown elapses
    Open,
    /// Admitting a bounded number of probes
    HalfOpen,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Init => "init",
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        };
        f.write_str(name)
    }
}

/// Service level objective configuring a breaker
///
/// Immutable once a breaker is constructed. The breaker never enforces
/// `timeout` on the wrapped call; it is the cooldown the circuit spends in
/// the Open state before probing again.
#[derive(Debug, Clone, Copy)]
pub struct Slo {
    /// Minimum tolerable success ratio, in (0, 1]
    pub success_rate: f64,
    /// How long the circuit stays open before probing again
    pub timeout: Duration,
    /// Period during which samples are ignored for throughput estimation
    pub warmup: Duration,
}

impl Default for Slo {
    fn default() -> Self {
        Self {
            success_rate: 0.99,
            timeout: Duration::from_secs(30),
            warmup: Duration::from_secs(60),
        }
    }
}
