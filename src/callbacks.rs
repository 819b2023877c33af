//! Observer hooks for breaker state transitions

use crate::State;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Type alias for transition observer functions
pub type TransitionFn = Arc<dyn Fn(State) + Send + Sync>;

/// Observers for breaker transitions
#[derive(Clone, Default)]
pub struct Callbacks {
    pub(crate) on_open: Option<TransitionFn>,
    pub(crate) on_close: Option<TransitionFn>,
    pub(crate) on_half_open: Option<TransitionFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the observer registered for `state`, if any. Observer panics are
    /// contained; they must not unwind into the thread driving the breaker.
    pub(crate) fn notify(&self, state: State) {
        let observer = match state {
            State::Open => &self.on_open,
            State::Closed => &self.on_close,
            State::HalfOpen => &self.on_half_open,
            State::Init => return,
        };
        if let Some(cb) = observer {
            let _ = catch_unwind(AssertUnwindSafe(|| cb.as_ref()(state)));
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .finish()
    }
}
