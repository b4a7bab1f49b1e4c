// src/engine/dispatcher.rs

//! Asynchronous event delivery for one DAG.
//!
//! A dispatcher serves a single DAG: vertex lanes are keyed by [`VertexId`]
//! alone, so two DAGs must not share one.
//!
//! One handler is registered per [`EventKind`]. Every addressed entity (the
//! DAG, each vertex, each vertex's task pool, the owner) gets its own lane:
//! an unbounded mpsc queue drained by a dedicated Tokio task. Consequences:
//!
//! - events for the same entity are handled one at a time, in submission
//!   order, which is what makes each state machine single-writer
//! - events for different entities are handled concurrently and may
//!   interleave arbitrarily
//!
//! [`Dispatcher::await_idle`] blocks until every event dispatched so far,
//! and every event those handlers dispatched in turn, has been handled.
//!
//! Lane tasks only hold a weak reference to the dispatcher. Dropping the last
//! [`Dispatcher`] handle drops every lane sender, so the lane tasks exit and
//! the registered handlers are released even without [`Dispatcher::stop`].
//!
//! [`VertexId`]: crate::engine::VertexId

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::{EntityKey, Event, EventKind};
use crate::errors::{DagError, Result};

/// Receives every event of the kind it was registered for.
///
/// Called from the lane of the event's entity, so calls for one entity never
/// overlap. Handlers must not block; further work is handed off by
/// dispatching new events through `dispatcher`.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: Event, dispatcher: &Dispatcher);
}

struct Lane {
    tx: mpsc::UnboundedSender<Event>,
    depth: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

struct Inner {
    handlers: RwLock<HashMap<EventKind, Arc<dyn EventHandler>>>,
    lanes: Mutex<HashMap<EntityKey, Lane>>,
    /// Dispatched but not yet fully handled.
    in_flight: AtomicUsize,
    idle: Notify,
    stopped: AtomicBool,
    backlog_warn_threshold: usize,
}

/// Cheaply cloneable handle to the shared dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("in_flight", &self.in_flight())
            .field("stopped", &self.inner.stopped.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Dispatcher {
    /// Create a dispatcher. `backlog_warn_threshold` is the per-lane queue
    /// depth at which a warning is logged (clamped to at least 1).
    pub fn new(backlog_warn_threshold: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                handlers: RwLock::new(HashMap::new()),
                lanes: Mutex::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                stopped: AtomicBool::new(false),
                backlog_warn_threshold: backlog_warn_threshold.max(1),
            }),
        }
    }

    /// Register the handler for `kind`, replacing any previous one.
    pub fn register(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        let mut handlers = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if handlers.insert(kind, handler).is_some() {
            warn!(?kind, "replacing previously registered event handler");
        } else {
            debug!(?kind, "registered event handler");
        }
    }

    /// Number of events dispatched but not yet handled.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Enqueue `event` for asynchronous delivery on its entity's lane.
    ///
    /// Must be called from within a Tokio runtime the first time an entity
    /// is addressed, since that spawns the lane.
    pub fn dispatch(&self, event: Event) -> Result<()> {
        let key = event.entity();
        let mut lanes = self
            .inner
            .lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Checked under the lanes lock: `stop` drains the map under the same
        // lock, so no lane can be created after it.
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(DagError::DispatcherStopped);
        }

        if !lanes.contains_key(&key) {
            let lane = self.spawn_lane(key)?;
            lanes.insert(key, lane);
        }
        let Some(lane) = lanes.get(&key) else {
            return Err(DagError::DispatcherStopped);
        };

        // Both counters go up before the send: the lane task may receive and
        // decrement before `send` even returns.
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let depth = lane.depth.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        if lane.tx.send(event).is_err() {
            saturating_decrement(&lane.depth);
            self.finish_one();
            return Err(DagError::DispatcherStopped);
        }

        if depth == self.inner.backlog_warn_threshold {
            warn!(entity = ?key, depth, "event backlog for entity reached warn threshold");
        }

        Ok(())
    }

    /// Wait until no dispatched event is still pending or being handled.
    pub async fn await_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a wakeup between the
            // check and the await is not lost.
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting events, close every lane and wait for the lane tasks
    /// to drain what they already hold.
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        let lanes: Vec<(EntityKey, Lane)> = {
            let mut lanes = self
                .inner
                .lanes
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            lanes.drain().collect()
        };

        info!(lanes = lanes.len(), "stopping dispatcher");
        for (key, lane) in lanes {
            drop(lane.tx);
            if let Err(err) = lane.handle.await {
                error!(entity = ?key, error = %err, "dispatcher lane task ended abnormally");
            }
        }
    }

    fn spawn_lane(&self, key: EntityKey) -> Result<Lane> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| DagError::NoRuntime)?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let depth = Arc::new(AtomicUsize::new(0));

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let lane_depth = Arc::clone(&depth);
        let handle = runtime.spawn(async move {
            debug!(entity = ?key, "dispatcher lane started");
            while let Some(event) = rx.recv().await {
                saturating_decrement(&lane_depth);
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let dispatcher = Dispatcher { inner };
                dispatcher.deliver(key, event);
                dispatcher.finish_one();
            }
            debug!(entity = ?key, "dispatcher lane closed");
        });

        Ok(Lane { tx, depth, handle })
    }

    fn deliver(&self, key: EntityKey, event: Event) {
        let kind = event.kind();
        let handler = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned();

        let Some(handler) = handler else {
            debug!(?kind, entity = ?key, "no handler registered for event kind; dropping");
            return;
        };

        // A panicking handler must not take the lane down with it, or
        // `in_flight` would never drain.
        if catch_unwind(AssertUnwindSafe(|| handler.handle(event, self))).is_err() {
            error!(?kind, entity = ?key, "event handler panicked; event dropped");
        }
    }

    fn finish_one(&self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

fn saturating_decrement(counter: &AtomicUsize) {
    // The closure always returns `Some`, so this never fails.
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
        Some(n.saturating_sub(1))
    });
}
