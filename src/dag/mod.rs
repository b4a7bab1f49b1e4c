// src/dag/mod.rs

//! Pure core of the coordinator.
//!
//! - [`graph`] validates a plan and freezes it into an indexed adjacency.
//! - [`vertex`] is the per-vertex state machine.
//! - [`machine`] is the DAG state machine.
//! - [`termination`] decides which vertices to kill and when the DAG is done.
//! - [`step`] defines the result type for a handled event.
//! - [`state`] and [`status`] hold lifecycle states and read-only snapshots.

pub mod graph;
pub mod machine;
pub mod state;
pub mod status;
pub mod step;
pub mod termination;
pub mod vertex;

pub use graph::DagGraph;
pub use machine::DagMachine;
pub use state::{DagState, TaskState, TerminationCause, VertexState};
pub use status::{DagStatus, Progress, ReportedState, VertexStatus};
pub use step::Step;
pub use termination::{Propagation, VertexTally};
pub use vertex::VertexMachine;
