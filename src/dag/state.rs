// src/dag/state.rs

//! Lifecycle states shared by the DAG and vertex state machines.

use std::fmt;

/// State of the whole job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DagState {
    New,
    Inited,
    Running,
    Succeeded,
    Failed,
    Killed,
    Error,
    KillWait,
}

impl DagState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DagState::Succeeded | DagState::Failed | DagState::Killed | DagState::Error
        )
    }
}

impl fmt::Display for DagState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DagState::New => "NEW",
            DagState::Inited => "INITED",
            DagState::Running => "RUNNING",
            DagState::Succeeded => "SUCCEEDED",
            DagState::Failed => "FAILED",
            DagState::Killed => "KILLED",
            DagState::Error => "ERROR",
            DagState::KillWait => "KILL_WAIT",
        };
        f.write_str(s)
    }
}

/// State of one vertex. Same shape as [`DagState`] at vertex scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexState {
    New,
    Inited,
    Running,
    Succeeded,
    Failed,
    Killed,
    Error,
    KillWait,
}

impl VertexState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            VertexState::Succeeded | VertexState::Failed | VertexState::Killed | VertexState::Error
        )
    }
}

impl fmt::Display for VertexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VertexState::New => "NEW",
            VertexState::Inited => "INITED",
            VertexState::Running => "RUNNING",
            VertexState::Succeeded => "SUCCEEDED",
            VertexState::Failed => "FAILED",
            VertexState::Killed => "KILLED",
            VertexState::Error => "ERROR",
            VertexState::KillWait => "KILL_WAIT",
        };
        f.write_str(s)
    }
}

/// Terminal state of a task, as reported by the task layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Succeeded,
    Failed,
    Killed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Succeeded => "SUCCEEDED",
            TaskState::Failed => "FAILED",
            TaskState::Killed => "KILLED",
        };
        f.write_str(s)
    }
}

/// Why the DAG is being torn down.
///
/// Assign-once: moves from `None` to a concrete cause at most one time and
/// never changes again. The final DAG state is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TerminationCause {
    #[default]
    None,
    UserKill,
    VertexFailure,
}

impl TerminationCause {
    /// Adopt `cause` if no cause has been set yet.
    ///
    /// Returns `true` only when this call set the cause, i.e. the caller is
    /// the one responsible for propagating kills.
    pub fn adopt(&mut self, cause: TerminationCause) -> bool {
        if *self == TerminationCause::None && cause != TerminationCause::None {
            *self = cause;
            true
        } else {
            false
        }
    }

    pub fn is_set(self) -> bool {
        self != TerminationCause::None
    }

    /// Final DAG state once every vertex is terminal.
    pub fn final_state(self) -> DagState {
        match self {
            TerminationCause::None => DagState::Succeeded,
            TerminationCause::UserKill => DagState::Killed,
            TerminationCause::VertexFailure => DagState::Failed,
        }
    }
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminationCause::None => "NONE",
            TerminationCause::UserKill => "USER_KILL",
            TerminationCause::VertexFailure => "VERTEX_FAILURE",
        };
        f.write_str(s)
    }
}
