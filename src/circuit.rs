//! Adaptive circuit breaker
//!
//! The controller wraps fallible calls, records their RED signals, and
//! decides admission from a composite health score computed over the
//! metric windows. Transitions are serialized by a single per-breaker
//! mutex; the mutex is released while the wrapped function runs, so
//! concurrent callers only serialize on the brief metric recording before
//! and after the call.

use crate::callbacks::Callbacks;
use crate::errors::CircuitError;
use crate::inflight::InFlight;
use crate::metrics::Metrics;
use crate::{Slo, State};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

/// State and metrics guarded by the breaker mutex
#[derive(Debug)]
struct Shared {
    state: State,
    revised_slo: Slo,
    metrics: Metrics,
    last_open_at: Option<Instant>,
}

impl Shared {
    /// Half-open admission cap: scale the probe budget by observed health.
    fn allow_probe(&self, in_flight: u32) -> bool {
        let error_rate = self.metrics.errors.mean_mid();
        let concurrency = self.metrics.concurrency.mean_mid();
        let allowed = if error_rate == 0.0 || concurrency == 0.0 {
            1.0
        } else {
            (1.0 - error_rate) * concurrency
        };
        f64::from(in_flight) <= allowed
    }

    /// Composite health score for the Closed state. A direct success-rate
    /// breach (weight 3) or a correlated spike across latency deviation,
    /// concurrency deviation and request-rate slope (weight 1 each) trips
    /// the circuit.
    fn must_open(&self) -> bool {
        let m = &self.metrics;
        let mut health = 0;

        if 1.0 - m.errors.mean() < self.revised_slo.success_rate {
            health += 3;
        }
        if m.latency.deviation() > 10.0 * m.latency.deviation_mid()
            || m.latency.deviation() > 5.0 * m.latency.deviation_long()
        {
            health += 1;
        }
        if m.concurrency.deviation() > 10.0 * m.concurrency.deviation_mid()
            || m.concurrency.deviation() > 5.0 * m.concurrency.deviation_long()
        {
            health += 1;
        }
        if m.requests.derivative() > 10.0 * m.requests.derivative_mid()
            || m.requests.derivative() > 5.0 * m.requests.derivative_long()
        {
            health += 1;
        }

        health >= 3
    }

    /// Half-open outcome: reopen on a success-rate breach, close once
    /// enough low-error probe samples have been seen, otherwise keep
    /// probing.
    fn probe_verdict(&self) -> State {
        let errors = &self.metrics.errors;
        if errors.mean() > 1.0 - self.revised_slo.success_rate {
            State::Open
        } else if errors.fill_rate() * f64::from(errors.capacity())
            > 1.0 / errors.mean_mid().max(0.1)
        {
            State::Closed
        } else {
            State::HalfOpen
        }
    }

    fn open(&mut self, at: Instant) {
        self.state = State::Open;
        self.last_open_at = Some(at);
        self.metrics.reset();
    }

    fn close(&mut self) {
        self.state = State::Closed;
        self.metrics.reset();
    }
}

/// Adaptive three-state circuit breaker
///
/// Safe to share across threads behind an `Arc`; every entry point takes
/// `&self`.
#[derive(Debug)]
pub struct CircuitBreaker {
    stated_slo: Slo,
    epoch: Instant,
    in_flight: InFlight,
    callbacks: Callbacks,
    shared: Mutex<Shared>,
}

impl CircuitBreaker {
    /// Create a breaker in the Closed state with a window of `size`
    /// samples per signal.
    pub fn new(slo: Slo, size: u16) -> Self {
        Self::with_state(slo, size, State::Closed, Callbacks::new())
    }

    pub(crate) fn with_state(slo: Slo, size: u16, state: State, callbacks: Callbacks) -> Self {
        Self {
            stated_slo: slo,
            epoch: Instant::now(),
            in_flight: InFlight::new(),
            callbacks,
            shared: Mutex::new(Shared {
                state,
                revised_slo: slo,
                metrics: Metrics::new(size),
                last_open_at: None,
            }),
        }
    }

    /// Execute a fallible operation with breaker protection.
    ///
    /// Returns the breaker state alongside the outcome. Refusals
    /// ([`CircuitError::Open`], [`CircuitError::HalfOpenThrottled`]) mean
    /// `f` never ran; an error from `f` itself is surfaced verbatim as
    /// [`CircuitError::Execution`].
    pub fn call<T, E, F>(&self, f: F) -> (State, Result<T, CircuitError<E>>)
    where
        F: FnOnce() -> Result<T, E>,
    {
        let start = Instant::now();
        let mut shared = self.shared.lock().unwrap();
        let mut probing = false;

        if shared.state == State::Open {
            let timeout = shared.revised_slo.timeout;
            let elapsed = shared
                .last_open_at
                .map_or(timeout, |at| start.saturating_duration_since(at));
            if elapsed < timeout {
                drop(shared);
                return (
                    State::Open,
                    Err(CircuitError::Open {
                        retry_after: timeout - elapsed,
                    }),
                );
            }
            shared.state = State::HalfOpen;
            probing = true;
            debug!("cooldown elapsed, probing upstream");
        }

        let entering = shared.state;
        // Held across `f`; drops on every return path, unwinds included.
        let _permit = self.in_flight.enter();

        if entering == State::HalfOpen && !shared.allow_probe(self.in_flight.count()) {
            drop(shared);
            if probing {
                self.callbacks.notify(State::HalfOpen);
            }
            return (State::HalfOpen, Err(CircuitError::HalfOpenThrottled));
        }

        if (entering == State::Closed || entering == State::Init) && shared.must_open() {
            let retry_after = shared.revised_slo.timeout;
            shared.open(start);
            drop(shared);
            warn!(retry_after = ?retry_after, "health degraded, circuit opened");
            self.callbacks.notify(State::Open);
            return (State::Open, Err(CircuitError::Open { retry_after }));
        }

        let t_start = self.micros_at(start);
        shared
            .metrics
            .record_concurrency(f64::from(self.in_flight.count()), t_start);
        shared.metrics.record_requests(1.0, t_start);
        drop(shared);
        if probing {
            self.callbacks.notify(State::HalfOpen);
        }

        let result = f();
        let end = Instant::now();

        let mut shared = self.shared.lock().unwrap();
        let t_end = self.micros_at(end);
        shared
            .metrics
            .record_latency(end.duration_since(start).as_micros() as f64, t_end);
        shared
            .metrics
            .record_errors(if result.is_err() { 1.0 } else { 0.0 }, t_end);

        let mut state = entering;
        // A concurrent probe may already have settled the circuit; only the
        // first verdict applies.
        if entering == State::HalfOpen && shared.state == State::HalfOpen {
            state = shared.probe_verdict();
            match state {
                State::Open => {
                    shared.open(end);
                    drop(shared);
                    warn!("probe failed, circuit reopened");
                    self.callbacks.notify(State::Open);
                }
                State::Closed => {
                    shared.close();
                    drop(shared);
                    info!("probes healthy, circuit closed");
                    self.callbacks.notify(State::Closed);
                }
                _ => drop(shared),
            }
        } else {
            drop(shared);
        }

        (state, result.map_err(CircuitError::Execution))
    }

    /// Current breaker state
    pub fn state(&self) -> State {
        self.shared.lock().unwrap().state
    }

    /// Number of admitted calls currently executing
    pub fn concurrents(&self) -> u32 {
        self.in_flight.count()
    }

    /// The SLO the breaker was constructed with
    pub fn slo(&self) -> Slo {
        self.stated_slo
    }

    /// Force the circuit open: metrics are reset and the cooldown starts now.
    pub fn open_circuit(&self) {
        let mut shared = self.shared.lock().unwrap();
        shared.open(Instant::now());
        drop(shared);
        warn!("circuit force-opened");
        self.callbacks.notify(State::Open);
    }

    fn micros_at(&self, at: Instant) -> f64 {
        at.duration_since(self.epoch).as_micros() as f64
    }
}
