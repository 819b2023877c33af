//! Builder API for ergonomic breaker configuration

use crate::callbacks::Callbacks;
use crate::facade::Levee;
use crate::{Slo, State};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating a [`Levee`] with a fluent API
pub struct LeveeBuilder {
    slo: Slo,
    callbacks: Callbacks,
}

impl LeveeBuilder {
    pub fn new() -> Self {
        Self {
            slo: Slo::default(),
            callbacks: Callbacks::new(),
        }
    }

    /// Set the minimum tolerable success ratio (clamped to 0.0-1.0)
    pub fn success_rate(mut self, rate: f64) -> Self {
        self.slo.success_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the Open-state cooldown before probing again
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.slo.timeout = timeout;
        self
    }

    /// Set the warm-up period ignored for throughput estimation
    pub fn warmup(mut self, warmup: Duration) -> Self {
        self.slo.warmup = warmup;
        self
    }

    /// Set an observer for when the circuit opens
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(State) + Send + Sync + 'static,
    {
        self.callbacks.on_open = Some(Arc::new(f));
        self
    }

    /// Set an observer for when the circuit closes
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(State) + Send + Sync + 'static,
    {
        self.callbacks.on_close = Some(Arc::new(f));
        self
    }

    /// Set an observer for when the circuit starts probing
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn(State) + Send + Sync + 'static,
    {
        self.callbacks.on_half_open = Some(Arc::new(f));
        self
    }

    /// Build the façade; it starts in warm-up
    pub fn build(self) -> Levee {
        Levee::with_callbacks(self.slo, self.callbacks)
    }
}

impl Default for LeveeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_builder_defaults() {
        let levee = LeveeBuilder::new().build();
        assert_eq!(levee.state(), State::Init);
    }

    #[test]
    fn test_builder_with_observers() {
        let opened = Arc::new(AtomicBool::new(false));
        let opened_clone = opened.clone();

        let levee = Levee::builder()
            .success_rate(0.99)
            .timeout(Duration::from_millis(50))
            .warmup(Duration::ZERO)
            .on_open(move |_| {
                opened_clone.store(true, Ordering::SeqCst);
            })
            .build();

        // Failures during warm-up still trip the circuit
        for _ in 0..10 {
            let (state, _) = levee.call(|| Err::<(), _>("error"));
            if state == State::Open {
                break;
            }
        }

        assert!(opened.load(Ordering::SeqCst), "on_open should fire");
    }
}
