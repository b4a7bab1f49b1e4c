// src/engine/coordinator.rs

//! Handle the owning application uses to drive one DAG attempt.
//!
//! A [`DagCoordinator`] owns the frozen graph, the DAG machine and one
//! vertex machine per plan vertex, plus the [`Dispatcher`] that moves events
//! between them. The task layer is external: it registers an
//! [`EventHandler`](crate::engine::EventHandler) for
//! [`EventKind::Task`] and reports terminal task states back through
//! [`DagCoordinator::task_completed`].

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::CoordinatorConfig;
use crate::dag::graph::DagGraph;
use crate::dag::machine::DagMachine;
use crate::dag::state::{DagState, TaskState, VertexState};
use crate::dag::status::{DagStatus, Progress, VertexStatus};
use crate::dag::vertex::VertexMachine;
use crate::engine::dispatcher::Dispatcher;
use crate::engine::handlers::{DagEventRouter, FinishRecorder, VertexEventRouter, lock};
use crate::engine::{
    DagEvent, DagEventKind, DagFinished, DagId, Event, EventKind, TaskId, VertexEvent, VertexId,
};
use crate::errors::Result;
use crate::plan::DagPlan;

/// State shared between the coordinator handle and the routers.
pub(crate) struct DagShared {
    pub(crate) id: DagId,
    pub(crate) dag: Mutex<DagMachine>,
    /// Indexed by `VertexId`.
    pub(crate) vertices: Vec<Mutex<VertexMachine>>,
    /// Latest DAG state, published after every DAG transition.
    pub(crate) state_tx: watch::Sender<DagState>,
    /// `DagFinished` notifications seen by the default owner handler.
    pub(crate) finished: Mutex<Vec<DagFinished>>,
}

pub struct DagCoordinator {
    shared: Arc<DagShared>,
    graph: DagGraph,
    dispatcher: Dispatcher,
}

impl fmt::Debug for DagCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DagCoordinator")
            .field("id", &self.shared.id)
            .field("vertices", &self.shared.vertices.len())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl DagCoordinator {
    /// Validate `plan`, build every machine in `NEW` and register the routers
    /// on a fresh dispatcher.
    ///
    /// Fails without creating any machine if the plan is malformed.
    pub fn new(id: DagId, plan: &DagPlan, config: &CoordinatorConfig) -> Result<Self> {
        let graph = DagGraph::build(plan)?;
        let gating = config.start_gating();

        let vertices = graph
            .vertex_ids()
            .zip(&plan.vertices)
            .map(|(vid, vplan)| Mutex::new(VertexMachine::new(id, vid, vplan, &graph, gating)))
            .collect();

        let (state_tx, _) = watch::channel(DagState::New);
        let shared = Arc::new(DagShared {
            id,
            dag: Mutex::new(DagMachine::new(id, plan.name.clone(), &graph)),
            vertices,
            state_tx,
            finished: Mutex::new(Vec::new()),
        });

        let dispatcher = Dispatcher::new(config.dispatcher.backlog_warn_threshold);
        dispatcher.register(EventKind::Dag, Arc::new(DagEventRouter::new(Arc::clone(&shared))));
        dispatcher.register(
            EventKind::Vertex,
            Arc::new(VertexEventRouter::new(Arc::clone(&shared))),
        );
        dispatcher.register(
            EventKind::DagFinished,
            Arc::new(FinishRecorder::new(Arc::clone(&shared))),
        );

        info!(
            dag = %id,
            plan = %plan.name,
            vertices = graph.len(),
            edges = graph.edges().len(),
            ?gating,
            "DAG coordinator created"
        );

        Ok(Self {
            shared,
            graph,
            dispatcher,
        })
    }

    pub fn id(&self) -> DagId {
        self.shared.id
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// The dispatcher driving this DAG. Register the task-layer handler (and
    /// optionally a replacement owner handler) here.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn init(&self) -> Result<()> {
        self.dispatch_dag(DagEventKind::Init)
    }

    pub fn start(&self) -> Result<()> {
        self.dispatch_dag(DagEventKind::Start)
    }

    /// Request a user kill. Idempotent once the DAG is tearing down.
    pub fn kill(&self) -> Result<()> {
        self.dispatch_dag(DagEventKind::Kill)
    }

    /// Report a terminal task state from the task layer.
    pub fn task_completed(&self, task: TaskId, state: TaskState) -> Result<()> {
        debug!(dag = %self.shared.id, %task, %state, "task completion reported");
        self.dispatcher
            .dispatch(Event::Vertex(VertexEvent::task_completed(task, state)))
    }

    /// Inject an arbitrary event.
    pub fn dispatch(&self, event: Event) -> Result<()> {
        self.dispatcher.dispatch(event)
    }

    fn dispatch_dag(&self, kind: DagEventKind) -> Result<()> {
        self.dispatcher
            .dispatch(Event::Dag(DagEvent::new(self.shared.id, kind)))
    }

    pub fn state(&self) -> DagState {
        lock(&self.shared.dag).state()
    }

    pub fn total_vertices(&self) -> usize {
        self.shared.vertices.len()
    }

    pub fn vertex_id(&self, name: &str) -> Option<VertexId> {
        self.graph.vertex_id(name)
    }

    pub fn vertex_state(&self, vertex: VertexId) -> Option<VertexState> {
        self.shared
            .vertices
            .get(vertex.index())
            .map(|v| lock(v).state())
    }

    pub fn vertex_status(&self, vertex: VertexId) -> Option<VertexStatus> {
        self.shared
            .vertices
            .get(vertex.index())
            .map(|v| lock(v).status())
    }

    /// Snapshot of the DAG with task counters summed over all vertices.
    ///
    /// Each machine is locked separately, so under concurrent activity the
    /// DAG counters and the task counters may be from slightly different
    /// moments.
    pub fn status(&self) -> DagStatus {
        let progress: Progress = self
            .shared
            .vertices
            .iter()
            .map(|v| lock(v).progress())
            .sum();

        let dag = lock(&self.shared.dag);
        DagStatus {
            id: dag.id(),
            name: dag.name().to_string(),
            state: dag.state(),
            termination_cause: dag.termination_cause(),
            total_vertices: dag.total_vertices(),
            successful_vertices: dag.successful_vertices(),
            failed_vertices: dag.failed_vertices(),
            killed_vertices: dag.killed_vertices(),
            progress,
            diagnostics: dag.diagnostics().to_vec(),
        }
    }

    /// `DagFinished` notifications delivered to the default owner handler.
    pub fn finish_notifications(&self) -> Vec<DagFinished> {
        lock(&self.shared.finished).clone()
    }

    /// Subscribe to DAG state changes.
    pub fn subscribe(&self) -> watch::Receiver<DagState> {
        self.shared.state_tx.subscribe()
    }

    /// Wait until every event dispatched so far has been handled.
    pub async fn await_idle(&self) {
        self.dispatcher.await_idle().await;
    }

    /// Wait until the DAG reaches a terminal state and return it.
    pub async fn wait_for_completion(&self) -> DagState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            // Sender lives in `shared`, which `self` keeps alive.
            Err(_) => self.state(),
        }
    }

    /// Stop the dispatcher. Further calls that dispatch fail with
    /// [`DagError::DispatcherStopped`](crate::errors::DagError::DispatcherStopped).
    pub async fn shutdown(&self) {
        self.dispatcher.stop().await;
    }
}
