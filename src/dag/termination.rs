// src/dag/termination.rs

//! Completion/kill propagation.
//!
//! This is the termination algebra of the DAG, kept apart from the
//! transition table in [`crate::dag::machine`]. It is a pure function of the
//! DAG's per-vertex bookkeeping and its [`TerminationCause`]:
//!
//! 1. recompute whether every vertex is terminal
//! 2. if a cause was freshly set, list every non-terminal vertex that has
//!    not been asked to die yet
//! 3. if every vertex is terminal, derive the final DAG state from the cause

use crate::dag::state::{DagState, TerminationCause, VertexState};
use crate::engine::VertexId;

/// What the DAG knows about one vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexTally {
    /// Terminal state reported through `VERTEX_COMPLETED`, once accounted.
    pub completed: Option<VertexState>,
    /// Whether a KILL has already been sent to this vertex.
    pub kill_requested: bool,
}

impl VertexTally {
    pub fn is_terminal(&self) -> bool {
        self.completed.is_some()
    }
}

/// Decision produced by [`propagate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Propagation {
    /// Vertices that must each receive exactly one KILL now.
    pub to_kill: Vec<VertexId>,
    pub all_terminal: bool,
    /// Set only when every vertex is terminal.
    pub final_state: Option<DagState>,
}

/// Evaluate the termination algebra after a vertex-state update.
///
/// `cause_fresh` must be `true` only for the update that set `cause`.
pub fn propagate(
    tallies: &[VertexTally],
    cause: TerminationCause,
    cause_fresh: bool,
) -> Propagation {
    let all_terminal = all_terminal(tallies);

    let to_kill = if cause_fresh && cause.is_set() {
        kill_targets(tallies)
    } else {
        Vec::new()
    };

    let final_state = all_terminal.then(|| cause.final_state());

    Propagation {
        to_kill,
        all_terminal,
        final_state,
    }
}

pub fn all_terminal(tallies: &[VertexTally]) -> bool {
    tallies.iter().all(VertexTally::is_terminal)
}

/// Non-terminal vertices that have not been sent a KILL yet.
pub fn kill_targets(tallies: &[VertexTally]) -> Vec<VertexId> {
    tallies
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_terminal() && !t.kill_requested)
        .map(|(i, _)| VertexId(i))
        .collect()
}
