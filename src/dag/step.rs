// src/dag/step.rs

//! Step-by-step result type for the DAG and vertex state machines.

use crate::engine::Event;

/// Structured result of handling a single event.
///
/// The shell dispatches `outbound`; tests use `from`/`to` to assert on the
/// transition without going through the dispatcher.
#[derive(Debug, Clone)]
pub struct Step<S> {
    /// State before the event was handled.
    pub from: S,
    /// State after the event was handled (equal to `from` for no-ops).
    pub to: S,
    /// Events produced by this step, in the order they must be dispatched.
    pub outbound: Vec<Event>,
}

impl<S: Copy + PartialEq> Step<S> {
    pub(crate) fn new(from: S, to: S, outbound: Vec<Event>) -> Self {
        Self { from, to, outbound }
    }

    /// Whether this step changed the state.
    pub fn transitioned(&self) -> bool {
        self.from != self.to
    }
}
