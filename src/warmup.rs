//! Warm-up front-end
//!
//! Before the adaptive breaker can be sized, the steady-state request rate
//! has to be observed. [`WarmupBreaker`] wraps a temporary size-100 breaker
//! in the Init state, counts calls once the warm-up period has elapsed,
//! and reports Closed after enough of them. Admission during warm-up
//! follows the normal breaker rules, so a sick upstream can still trip the
//! circuit while the window is being calibrated.

use crate::callbacks::Callbacks;
use crate::circuit::CircuitBreaker;
use crate::errors::CircuitError;
use crate::{Slo, State};
use std::sync::Mutex;
use std::time::Instant;

/// Temporary window capacity while the real one is being measured.
const WARMUP_WINDOW: u16 = 100;

/// Calls observed after warm-up before the breaker counts as sized.
const PROMOTION_CALLS: u32 = 1000;

/// Window capacity floor; keeps the half-open close test meaningful.
const SIZE_FLOOR: f64 = 100.0;

#[derive(Debug, Default)]
struct Progress {
    req_count: u32,
    end: Option<Instant>,
}

/// Breaker front-end that measures throughput during warm-up
#[derive(Debug)]
pub struct WarmupBreaker {
    inner: CircuitBreaker,
    start: Instant,
    progress: Mutex<Progress>,
}

impl WarmupBreaker {
    pub fn new(slo: Slo) -> Self {
        Self::with_callbacks(slo, Callbacks::new())
    }

    pub(crate) fn with_callbacks(slo: Slo, callbacks: Callbacks) -> Self {
        Self {
            inner: CircuitBreaker::with_state(slo, WARMUP_WINDOW, State::Init, callbacks),
            start: Instant::now(),
            progress: Mutex::new(Progress::default()),
        }
    }

    /// Delegate to the inner breaker, then account for throughput.
    ///
    /// Reports Closed once enough post-warm-up calls have been seen, or if
    /// the inner breaker settled into Closed on its own after an Open
    /// episode; the façade uses that signal to build the sized breaker.
    pub fn call<T, E, F>(&self, f: F) -> (State, Result<T, CircuitError<E>>)
    where
        F: FnOnce() -> Result<T, E>,
    {
        let now = Instant::now();
        let (mut state, result) = self.inner.call(f);

        let mut progress = self.progress.lock().unwrap();
        if now.duration_since(self.start) > self.inner.slo().warmup {
            progress.req_count += 1;
        }
        if progress.req_count > PROMOTION_CALLS || state == State::Closed {
            if progress.end.is_none() {
                progress.end = Some(now);
            }
            state = State::Closed;
        }

        (state, result)
    }

    /// Current state of the underlying breaker
    pub fn state(&self) -> State {
        self.inner.state()
    }

    /// Window capacity for the adaptive breaker: roughly one second of
    /// observed traffic, floored so the rate tests in the half-open
    /// decision stay meaningful, and bounded by the u16 sample index.
    pub(crate) fn window_size(&self) -> u16 {
        let slo = self.inner.slo();
        let progress = self.progress.lock().unwrap();
        let end = progress.end.unwrap_or_else(Instant::now);

        let measured = end.duration_since(self.start).as_secs_f64() - slo.warmup.as_secs_f64();
        let rps = f64::from(progress.req_count) / measured;
        let slo_floor = 10.0 / (1.0 - slo.success_rate);

        rps.max(SIZE_FLOOR)
            .max(slo_floor)
            .clamp(1.0, f64::from(u16::MAX)) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn instant_slo(success_rate: f64) -> Slo {
        Slo {
            success_rate,
            timeout: Duration::from_millis(50),
            warmup: Duration::ZERO,
        }
    }

    #[test]
    fn test_init_until_enough_calls() {
        let warmup = WarmupBreaker::new(instant_slo(0.99));

        for i in 1..=PROMOTION_CALLS {
            let (state, result) = warmup.call(|| Ok::<_, &str>(()));
            assert!(result.is_ok());
            assert_eq!(state, State::Init, "closed early at call {}", i);
        }

        let (state, _) = warmup.call(|| Ok::<_, &str>(()));
        assert_eq!(state, State::Closed);
    }

    #[test]
    fn test_calls_inside_warmup_period_do_not_count() {
        let slo = Slo {
            success_rate: 0.99,
            timeout: Duration::from_millis(50),
            warmup: Duration::from_millis(200),
        };
        let warmup = WarmupBreaker::new(slo);

        for _ in 0..5 {
            let _ = warmup.call(|| Ok::<_, &str>(()));
        }

        assert_eq!(warmup.progress.lock().unwrap().req_count, 0);
    }

    #[test]
    fn test_window_size_tracks_observed_rate() {
        let warmup = WarmupBreaker::new(instant_slo(0.5));
        {
            let mut progress = warmup.progress.lock().unwrap();
            progress.req_count = 5000;
            progress.end = Some(warmup.start + Duration::from_secs(2));
        }

        assert_eq!(warmup.window_size(), 2500);
    }

    #[test]
    fn test_window_size_floors() {
        // Too little traffic: the fixed floor wins
        let warmup = WarmupBreaker::new(instant_slo(0.5));
        {
            let mut progress = warmup.progress.lock().unwrap();
            progress.req_count = 10;
            progress.end = Some(warmup.start + Duration::from_secs(2));
        }
        assert_eq!(warmup.window_size(), 100);

        // Tight SLO: the rate-test floor wins
        let warmup = WarmupBreaker::new(instant_slo(0.99));
        {
            let mut progress = warmup.progress.lock().unwrap();
            progress.req_count = 10;
            progress.end = Some(warmup.start + Duration::from_secs(2));
        }
        assert_eq!(warmup.window_size(), 1000);
    }

    #[test]
    fn test_window_size_is_clamped_to_u16() {
        let warmup = WarmupBreaker::new(instant_slo(0.5));
        {
            let mut progress = warmup.progress.lock().unwrap();
            progress.req_count = u32::MAX;
            progress.end = Some(warmup.start + Duration::from_millis(1));
        }

        assert_eq!(warmup.window_size(), u16::MAX);
    }

    #[test]
    fn test_recovery_during_warmup_promotes() {
        let warmup = WarmupBreaker::new(instant_slo(0.5));
        warmup.inner.open_circuit();
        thread::sleep(Duration::from_millis(60));

        let mut promoted = false;
        for _ in 0..100 {
            let (state, _) = warmup.call(|| Ok::<_, &str>(()));
            if state == State::Closed {
                promoted = true;
                break;
            }
        }

        assert!(promoted, "recovered breaker should signal promotion");
        assert!(warmup.progress.lock().unwrap().end.is_some());
    }
}
