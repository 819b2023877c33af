//! Error types for breaker-guarded calls

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Errors that can come out of a breaker-guarded call
///
/// The two refusal variants mean the wrapped operation never ran; callers
/// use them to skip retry logic that only makes sense for real failures.
#[derive(Debug)]
pub enum CircuitError<E = Box<dyn Error + Send + Sync>> {
    /// Circuit is open, calls are being refused
    Open {
        /// Remaining cooldown before the circuit probes again
        retry_after: Duration,
    },
    /// Half-open probe budget is exhausted
    HalfOpenThrottled,
    /// The wrapped operation ran and failed
    Execution(E),
}

impl<E> CircuitError<E> {
    /// True when the breaker refused admission and the wrapped call never ran.
    pub fn is_refusal(&self) -> bool {
        !matches!(self, CircuitError::Execution(_))
    }
}

impl<E: fmt::Display> fmt::Display for CircuitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitError::Open { retry_after } => {
                write!(f, "circuit is open (retry after {:?})", retry_after)
            }
            CircuitError::HalfOpenThrottled => {
                write!(f, "circuit is half-open and the probe budget is exhausted")
            }
            CircuitError::Execution(e) => write!(f, "circuit execution failed: {}", e),
        }
    }
}

impl<E: Error + 'static> Error for CircuitError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CircuitError::Execution(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusals_are_distinguishable_from_execution_errors() {
        let open: CircuitError<String> = CircuitError::Open {
            retry_after: Duration::from_secs(1),
        };
        let throttled: CircuitError<String> = CircuitError::HalfOpenThrottled;
        let execution = CircuitError::Execution("boom".to_string());

        assert!(open.is_refusal());
        assert!(throttled.is_refusal());
        assert!(!execution.is_refusal());
    }

    #[test]
    fn execution_error_is_surfaced_in_display() {
        let err = CircuitError::Execution("connection reset");
        assert!(err.to_string().contains("connection reset"));
    }
}
