// src/engine/mod.rs

//! Event model and asynchronous shell around the pure state machines.
//!
//! This module ties together:
//! - identifiers for the DAG, its vertices and their tasks
//! - the typed events that flow between the DAG, its vertices, the external
//!   task layer and the owning application
//! - the [`dispatcher`], which delivers events per entity, in order
//! - the [`handlers`] that route events into the state machines
//! - the [`coordinator`] handle the owning application talks to
//!
//! The state machines themselves live in [`crate::dag`] and never touch
//! Tokio; they return outbound [`Event`]s that the shell dispatches.

use std::fmt;

use crate::dag::state::{DagState, TaskState, VertexState};
use crate::plan::ResourceHint;

pub mod coordinator;
pub mod dispatcher;
pub mod handlers;

pub use coordinator::DagCoordinator;
pub use dispatcher::{Dispatcher, EventHandler};
pub use handlers::{DagEventRouter, VertexEventRouter};

/// Unique identifier of one job attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DagId(pub u64);

impl fmt::Display for DagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dag_{}", self.0)
    }
}

/// DAG-scoped vertex ordinal: the vertex's position in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub usize);

impl VertexId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vertex_{}", self.0)
    }
}

/// A task within a vertex, identified by its index `0..num_tasks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    pub vertex: VertexId,
    pub index: usize,
}

impl TaskId {
    pub fn new(vertex: VertexId, index: usize) -> Self {
        Self { vertex, index }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task_{}_{}", self.vertex.0, self.index)
    }
}

/// Events addressed to the DAG state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DagEventKind {
    Init,
    Start,
    Kill,
    /// A vertex reached a terminal state. The only way the DAG learns of
    /// vertex completion.
    VertexCompleted {
        vertex: VertexId,
        state: VertexState,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagEvent {
    pub dag: DagId,
    pub kind: DagEventKind,
}

impl DagEvent {
    pub fn new(dag: DagId, kind: DagEventKind) -> Self {
        Self { dag, kind }
    }

    pub fn vertex_completed(dag: DagId, vertex: VertexId, state: VertexState) -> Self {
        Self::new(dag, DagEventKind::VertexCompleted { vertex, state })
    }
}

/// Events addressed to a single vertex state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VertexEventKind {
    Init,
    Start,
    /// A source vertex entered RUNNING.
    SourceStarted { source: VertexId },
    /// A source vertex entered SUCCEEDED.
    SourceSucceeded { source: VertexId },
    /// Terminal task report from the external task layer.
    TaskCompleted { task: TaskId, state: TaskState },
    Kill,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexEvent {
    pub vertex: VertexId,
    pub kind: VertexEventKind,
}

impl VertexEvent {
    pub fn new(vertex: VertexId, kind: VertexEventKind) -> Self {
        Self { vertex, kind }
    }

    pub fn task_completed(task: TaskId, state: TaskState) -> Self {
        Self::new(task.vertex, VertexEventKind::TaskCompleted { task, state })
    }
}

/// Requests from a vertex to the external task layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEventKind {
    /// The vertex entered RUNNING; these tasks need execution slots.
    Schedule {
        tasks: Vec<TaskId>,
        resource: ResourceHint,
    },
    /// Stop these tasks and report them back as KILLED.
    Kill { tasks: Vec<TaskId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    pub vertex: VertexId,
    pub kind: TaskEventKind,
}

/// Emitted once when the DAG first reaches a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DagFinished {
    pub dag: DagId,
    pub state: DagState,
}

/// Every event the dispatcher can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Dag(DagEvent),
    Vertex(VertexEvent),
    Task(TaskEvent),
    DagFinished(DagFinished),
}

/// Event type used to select the registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Dag,
    Vertex,
    Task,
    DagFinished,
}

/// The entity an event is addressed to. Events for the same key are
/// delivered in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Dag(DagId),
    Vertex(VertexId),
    Tasks(VertexId),
    Owner(DagId),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Dag(_) => EventKind::Dag,
            Event::Vertex(_) => EventKind::Vertex,
            Event::Task(_) => EventKind::Task,
            Event::DagFinished(_) => EventKind::DagFinished,
        }
    }

    pub fn entity(&self) -> EntityKey {
        match self {
            Event::Dag(ev) => EntityKey::Dag(ev.dag),
            Event::Vertex(ev) => EntityKey::Vertex(ev.vertex),
            Event::Task(ev) => EntityKey::Tasks(ev.vertex),
            Event::DagFinished(ev) => EntityKey::Owner(ev.dag),
        }
    }
}
