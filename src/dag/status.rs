// src/dag/status.rs

//! Read-only snapshots for the status-reporting layer.

use std::fmt;
use std::iter::Sum;

use crate::dag::state::{DagState, TerminationCause, VertexState};
use crate::engine::{DagId, VertexId};

/// Per-vertex (or aggregated) task counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub total: usize,
    pub succeeded: usize,
    pub running: usize,
    pub failed: usize,
    pub killed: usize,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {} Succeeded: {} Running: {} Failed: {} Killed: {}",
            self.total, self.succeeded, self.running, self.failed, self.killed
        )
    }
}

impl Sum for Progress {
    fn sum<I: Iterator<Item = Progress>>(iter: I) -> Self {
        iter.fold(Progress::default(), |acc, p| Progress {
            total: acc.total + p.total,
            succeeded: acc.succeeded + p.succeeded,
            running: acc.running + p.running,
            failed: acc.failed + p.failed,
            killed: acc.killed + p.killed,
        })
    }
}

/// Client-facing state: transitional internal states are folded into the
/// state a client would act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedState {
    Inited,
    Running,
    Succeeded,
    Failed,
    Killed,
    Error,
}

impl From<VertexState> for ReportedState {
    fn from(state: VertexState) -> Self {
        match state {
            VertexState::New | VertexState::Inited => ReportedState::Inited,
            VertexState::Running => ReportedState::Running,
            VertexState::Succeeded => ReportedState::Succeeded,
            VertexState::Failed => ReportedState::Failed,
            VertexState::Killed | VertexState::KillWait => ReportedState::Killed,
            VertexState::Error => ReportedState::Error,
        }
    }
}

impl From<DagState> for ReportedState {
    fn from(state: DagState) -> Self {
        match state {
            DagState::New | DagState::Inited => ReportedState::Inited,
            DagState::Running => ReportedState::Running,
            DagState::Succeeded => ReportedState::Succeeded,
            DagState::Failed => ReportedState::Failed,
            DagState::Killed | DagState::KillWait => ReportedState::Killed,
            DagState::Error => ReportedState::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexStatus {
    pub id: VertexId,
    pub name: String,
    pub state: VertexState,
    pub distance_from_root: u32,
    pub progress: Progress,
    pub diagnostics: Vec<String>,
}

impl VertexStatus {
    pub fn reported_state(&self) -> ReportedState {
        self.state.into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagStatus {
    pub id: DagId,
    pub name: String,
    pub state: DagState,
    pub termination_cause: TerminationCause,
    pub total_vertices: usize,
    pub successful_vertices: usize,
    pub failed_vertices: usize,
    pub killed_vertices: usize,
    /// Task counters summed over all vertices.
    pub progress: Progress,
    pub diagnostics: Vec<String>,
}

impl DagStatus {
    pub fn reported_state(&self) -> ReportedState {
        self.state.into()
    }

    /// Vertices the DAG has accounted as terminal.
    pub fn completed_vertices(&self) -> usize {
        self.successful_vertices + self.failed_vertices + self.killed_vertices
    }
}
