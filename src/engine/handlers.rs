// src/engine/handlers.rs

//! Event handlers that route dispatcher events into the state machines.
//!
//! Each router locks exactly one machine, feeds it the event, releases the
//! lock and only then dispatches the outbound events. No handler ever holds
//! two machine locks at once.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::engine::coordinator::DagShared;
use crate::engine::dispatcher::{Dispatcher, EventHandler};
use crate::engine::{DagFinished, Event};

/// Lock a machine, recovering the guard if a previous holder panicked.
///
/// Machines only mutate inside `handle`, which leaves them in a valid state
/// between statements, so a poisoned lock still guards usable data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn dispatch_all(dispatcher: &Dispatcher, outbound: Vec<Event>) {
    for event in outbound {
        trace!(?event, "dispatching outbound event");
        if let Err(err) = dispatcher.dispatch(event) {
            warn!(error = %err, "failed to dispatch outbound event");
        }
    }
}

/// Routes `Event::Dag` into the DAG state machine.
pub struct DagEventRouter {
    shared: Arc<DagShared>,
}

impl DagEventRouter {
    pub(crate) fn new(shared: Arc<DagShared>) -> Self {
        Self { shared }
    }
}

impl EventHandler for DagEventRouter {
    fn handle(&self, event: Event, dispatcher: &Dispatcher) {
        let Event::Dag(event) = event else {
            warn!(?event, "DAG router received a non-DAG event; dropping");
            return;
        };
        if event.dag != self.shared.id {
            warn!(
                expected = %self.shared.id,
                got = %event.dag,
                "DAG event for a different DAG; dropping"
            );
            return;
        }

        let step = lock(&self.shared.dag).handle(event.kind);
        if step.transitioned() {
            self.shared.state_tx.send_replace(step.to);
        }
        dispatch_all(dispatcher, step.outbound);
    }
}

/// Routes `Event::Vertex` into the addressed vertex state machine.
pub struct VertexEventRouter {
    shared: Arc<DagShared>,
}

impl VertexEventRouter {
    pub(crate) fn new(shared: Arc<DagShared>) -> Self {
        Self { shared }
    }
}

impl EventHandler for VertexEventRouter {
    fn handle(&self, event: Event, dispatcher: &Dispatcher) {
        let Event::Vertex(event) = event else {
            warn!(?event, "vertex router received a non-vertex event; dropping");
            return;
        };
        let Some(vertex) = self.shared.vertices.get(event.vertex.index()) else {
            warn!(dag = %self.shared.id, vertex = %event.vertex, "event for unknown vertex; dropping");
            return;
        };

        let step = lock(vertex).handle(event.kind);
        dispatch_all(dispatcher, step.outbound);
    }
}

/// Default owner-side handler: records every `DagFinished` it receives.
pub(crate) struct FinishRecorder {
    shared: Arc<DagShared>,
}

impl FinishRecorder {
    pub(crate) fn new(shared: Arc<DagShared>) -> Self {
        Self { shared }
    }
}

impl EventHandler for FinishRecorder {
    fn handle(&self, event: Event, _dispatcher: &Dispatcher) {
        let Event::DagFinished(finished @ DagFinished { dag, state }) = event else {
            return;
        };
        debug!(%dag, %state, "DAG finished notification delivered");
        lock(&self.shared.finished).push(finished);
    }
}
