//! Breaker façade
//!
//! A [`Levee`] starts every breaker life cycle in warm-up, then swaps in an
//! adaptive breaker sized from the observed request rate. The swap is
//! monotonic: exactly one breaker is the target of `call` at any time.

use crate::builder::LeveeBuilder;
use crate::callbacks::Callbacks;
use crate::circuit::CircuitBreaker;
use crate::errors::CircuitError;
use crate::warmup::WarmupBreaker;
use crate::{Slo, State};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

#[derive(Debug)]
enum Stage {
    Warmup(Arc<WarmupBreaker>),
    Ready(Arc<CircuitBreaker>),
}

/// Self-tuning circuit breaker handle
///
/// Safe to share across threads behind an `Arc`; every entry point takes
/// `&self`.
#[derive(Debug)]
pub struct Levee {
    slo: Slo,
    callbacks: Callbacks,
    stage: RwLock<Stage>,
}

impl Levee {
    pub fn new(slo: Slo) -> Self {
        Self::with_callbacks(slo, Callbacks::new())
    }

    /// Create a builder for a breaker with transition observers
    pub fn builder() -> LeveeBuilder {
        LeveeBuilder::new()
    }

    pub(crate) fn with_callbacks(slo: Slo, callbacks: Callbacks) -> Self {
        Self {
            slo,
            callbacks: callbacks.clone(),
            stage: RwLock::new(Stage::Warmup(Arc::new(WarmupBreaker::with_callbacks(
                slo, callbacks,
            )))),
        }
    }

    /// Execute a fallible operation behind the active breaker.
    ///
    /// During warm-up this goes through the front-end; once the front-end
    /// reports Closed the adaptive breaker is constructed and takes over.
    pub fn call<T, E, F>(&self, f: F) -> (State, Result<T, CircuitError<E>>)
    where
        F: FnOnce() -> Result<T, E>,
    {
        let stage = self.stage.read().unwrap();
        match &*stage {
            Stage::Ready(breaker) => {
                let breaker = Arc::clone(breaker);
                drop(stage);
                breaker.call(f)
            }
            Stage::Warmup(warmup) => {
                let warmup = Arc::clone(warmup);
                drop(stage);
                let (state, result) = warmup.call(f);
                if state == State::Closed {
                    self.promote(&warmup);
                }
                (state, result)
            }
        }
    }

    /// Swap the warm-up front-end for an adaptive breaker sized from its
    /// throughput measurement. Concurrent promoters collapse to one, and a
    /// front-end replaced by `expunge` cannot promote.
    fn promote(&self, from: &Arc<WarmupBreaker>) {
        let mut stage = self.stage.write().unwrap();
        if let Stage::Warmup(current) = &*stage {
            if Arc::ptr_eq(current, from) {
                let size = from.window_size();
                info!(size, "warm-up complete, adaptive breaker sized");
                *stage = Stage::Ready(Arc::new(CircuitBreaker::with_state(
                    self.slo,
                    size,
                    State::Closed,
                    self.callbacks.clone(),
                )));
            }
        }
    }

    /// Current state of the active breaker
    pub fn state(&self) -> State {
        match &*self.stage.read().unwrap() {
            Stage::Warmup(warmup) => warmup.state(),
            Stage::Ready(breaker) => breaker.state(),
        }
    }

    /// Discard the active breaker and begin a fresh warm-up with the same SLO.
    pub fn expunge(&self) {
        let mut stage = self.stage.write().unwrap();
        debug!("breaker expunged, restarting warm-up");
        *stage = Stage::Warmup(Arc::new(WarmupBreaker::with_callbacks(
            self.slo,
            self.callbacks.clone(),
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn promote(levee: &Levee) {
        for _ in 0..=1001 {
            let (state, _) = levee.call(|| Ok::<_, &str>(()));
            if state == State::Closed {
                return;
            }
        }
        panic!("levee never promoted");
    }

    #[test]
    fn test_new_levee_starts_in_init() {
        let levee = Levee::new(Slo::default());
        assert_eq!(levee.state(), State::Init);
    }

    #[test]
    fn test_warmup_phase_closes_after_enough_calls() {
        let slo = Slo {
            success_rate: 0.99,
            timeout: Duration::from_secs(5),
            warmup: Duration::from_secs(1),
        };
        let levee = Levee::new(slo);

        thread::sleep(slo.warmup);

        for i in 1..=1000 {
            let (state, result) = levee.call(|| Ok::<_, &str>(()));
            assert!(result.is_ok(), "unexpected error during warm-up");
            assert_ne!(state, State::Closed, "closed early at call {}", i);
        }

        let (state, result) = levee.call(|| Ok::<_, &str>(()));
        assert!(result.is_ok());
        assert_eq!(state, State::Closed);
        assert_eq!(levee.state(), State::Closed);
    }

    #[test]
    fn test_failures_open_the_circuit() {
        let slo = Slo {
            success_rate: 0.99,
            timeout: Duration::from_secs(5),
            warmup: Duration::ZERO,
        };
        let levee = Levee::new(slo);
        promote(&levee);

        for _ in 0..100 {
            let (state, _) = levee.call(|| Err::<(), _>("test error"));
            if state == State::Open {
                return;
            }
        }

        panic!("circuit never opened despite consistent failures");
    }

    #[test]
    fn test_recovery_to_closed() {
        let slo = Slo {
            success_rate: 0.95,
            timeout: Duration::from_millis(100),
            warmup: Duration::ZERO,
        };
        let levee = Levee::new(slo);
        promote(&levee);

        for _ in 0..100 {
            let (state, _) = levee.call(|| Err::<(), _>("test error"));
            if state == State::Open {
                break;
            }
        }
        assert_eq!(levee.state(), State::Open);

        thread::sleep(slo.timeout);

        let (state, result) = levee.call(|| Ok::<_, &str>(()));
        assert_eq!(state, State::HalfOpen);
        assert!(result.is_ok());

        let mut last_state = state;
        for _ in 0..100 {
            let (state, _) = levee.call(|| Ok::<_, &str>(()));
            last_state = state;
            if state == State::Closed {
                break;
            }
        }
        assert_eq!(last_state, State::Closed, "circuit failed to recover");
    }

    #[test]
    fn test_open_refusals_are_flagged() {
        let slo = Slo {
            success_rate: 0.99,
            timeout: Duration::from_secs(5),
            warmup: Duration::ZERO,
        };
        let levee = Levee::new(slo);
        promote(&levee);

        while levee.state() != State::Open {
            let _ = levee.call(|| Err::<(), _>("test error"));
        }

        let (state, result) = levee.call(|| Ok::<_, &str>(()));
        assert_eq!(state, State::Open);
        match result {
            Err(err) => assert!(err.is_refusal()),
            Ok(()) => panic!("open circuit admitted a call"),
        }
    }

    #[test]
    fn test_expunge_restarts_warmup() {
        let slo = Slo {
            success_rate: 0.99,
            timeout: Duration::from_secs(5),
            warmup: Duration::ZERO,
        };
        let levee = Levee::new(slo);
        promote(&levee);
        assert_eq!(levee.state(), State::Closed);

        levee.expunge();
        assert_eq!(levee.state(), State::Init);

        // Next call is handled by the fresh warm-up front-end
        let (state, result) = levee.call(|| Ok::<_, &str>(()));
        assert_eq!(state, State::Init);
        assert!(result.is_ok());
    }
}
