// src/dag/machine.rs

//! DAG state machine.
//!
//! Owns the job-level lifecycle, the sticky [`TerminationCause`] and the
//! vertex counters. Counters change only here, in response to
//! `VERTEX_COMPLETED`; kill propagation and the final-state decision are
//! delegated to [`crate::dag::termination`].
//!
//! Like [`crate::dag::vertex::VertexMachine`] this is pure: no channels, no
//! Tokio, no IO. Events that have no transition from the current state are
//! protocol violations and move the DAG to `ERROR`; they are never queued
//! and never silently dropped (except the documented idempotent cases:
//! late KILL and duplicate `VERTEX_COMPLETED`).

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::state::{DagState, TerminationCause, VertexState};
use crate::dag::step::Step;
use crate::dag::termination::{self, Propagation, VertexTally};
use crate::engine::{
    DagEventKind, DagFinished, DagId, Event, VertexEvent, VertexEventKind, VertexId,
};

#[derive(Debug, Clone)]
pub struct DagMachine {
    id: DagId,
    name: String,
    state: DagState,
    cause: TerminationCause,
    vertex_names: Vec<String>,
    tallies: Vec<VertexTally>,
    successful_vertices: usize,
    failed_vertices: usize,
    killed_vertices: usize,
    /// `DagFinished` has been emitted.
    finish_notified: bool,
    diagnostics: Vec<String>,
}

impl DagMachine {
    pub fn new(id: DagId, name: impl Into<String>, graph: &DagGraph) -> Self {
        let vertex_names = graph
            .vertex_ids()
            .map(|v| graph.name_of(v).unwrap_or_default().to_string())
            .collect();
        Self {
            id,
            name: name.into(),
            state: DagState::New,
            cause: TerminationCause::None,
            vertex_names,
            tallies: vec![VertexTally::default(); graph.len()],
            successful_vertices: 0,
            failed_vertices: 0,
            killed_vertices: 0,
            finish_notified: false,
            diagnostics: Vec::new(),
        }
    }

    pub fn id(&self) -> DagId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> DagState {
        self.state
    }

    pub fn termination_cause(&self) -> TerminationCause {
        self.cause
    }

    pub fn total_vertices(&self) -> usize {
        self.tallies.len()
    }

    pub fn successful_vertices(&self) -> usize {
        self.successful_vertices
    }

    pub fn failed_vertices(&self) -> usize {
        self.failed_vertices
    }

    pub fn killed_vertices(&self) -> usize {
        self.killed_vertices
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn tally(&self, vertex: VertexId) -> Option<&VertexTally> {
        self.tallies.get(vertex.index())
    }

    /// Whether a `VERTEX_COMPLETED` for `vertex` has been counted.
    pub fn is_accounted(&self, vertex: VertexId) -> bool {
        self.tally(vertex).is_some_and(VertexTally::is_terminal)
    }

    /// Handle one event and return the resulting transition plus outbound
    /// events.
    pub fn handle(&mut self, event: DagEventKind) -> Step<DagState> {
        let from = self.state;
        let mut out = Vec::new();

        match (self.state, event) {
            (DagState::New, DagEventKind::Init) => {
                self.transition(DagState::Inited);
                out.extend(self.broadcast(VertexEventKind::Init));
            }
            (DagState::Inited, DagEventKind::Start) => {
                self.transition(DagState::Running);
                out.extend(self.broadcast(VertexEventKind::Start));
            }
            (DagState::Inited | DagState::Running, DagEventKind::Kill) => {
                self.on_kill(&mut out);
            }
            (DagState::KillWait, DagEventKind::Kill) => {
                debug!(dag = %self.id, "kill already in progress; ignoring");
            }
            (state, DagEventKind::Kill) if state.is_terminal() => {
                debug!(dag = %self.id, %state, "late kill on finished DAG; ignoring");
            }
            (
                DagState::Running | DagState::KillWait,
                DagEventKind::VertexCompleted { vertex, state },
            ) => {
                self.on_vertex_completed(vertex, state, &mut out);
            }
            (DagState::Error, event) => {
                debug!(dag = %self.id, ?event, "DAG in ERROR; ignoring event");
            }
            (state, DagEventKind::VertexCompleted { vertex, .. })
                if state.is_terminal() && self.is_accounted(vertex) =>
            {
                debug!(dag = %self.id, %vertex, "duplicate vertex completion; ignoring");
            }
            (state, event) => {
                self.protocol_violation(format!("invalid event {event:?} in state {state}"), &mut out);
            }
        }

        Step::new(from, self.state, out)
    }

    fn transition(&mut self, to: DagState) {
        debug!(
            dag = %self.id,
            from = %self.state,
            to = %to,
            cause = %self.cause,
            "DAG transition"
        );
        self.state = to;
    }

    fn broadcast(&self, kind: VertexEventKind) -> impl Iterator<Item = Event> + '_ {
        (0..self.tallies.len())
            .map(move |i| Event::Vertex(VertexEvent::new(VertexId(i), kind.clone())))
    }

    fn vertex_name(&self, vertex: VertexId) -> &str {
        self.vertex_names
            .get(vertex.index())
            .map(String::as_str)
            .unwrap_or("<unknown>")
    }

    fn on_kill(&mut self, out: &mut Vec<Event>) {
        let fresh = self.cause.adopt(TerminationCause::UserKill);
        if fresh {
            info!(dag = %self.id, "DAG kill requested by user");
            self.diagnostics.push("DAG killed by user".to_string());
        } else {
            info!(
                dag = %self.id,
                cause = %self.cause,
                "kill requested while termination already in progress; keeping first cause"
            );
        }

        self.transition(DagState::KillWait);
        let propagation = termination::propagate(&self.tallies, self.cause, fresh);
        self.apply(propagation, out);
    }

    fn on_vertex_completed(&mut self, vertex: VertexId, state: VertexState, out: &mut Vec<Event>) {
        if !state.is_terminal() {
            self.protocol_violation(
                format!("completion of {vertex} with non-terminal state {state}"),
                out,
            );
            return;
        }

        let name = self.vertex_name(vertex).to_string();
        let Some(tally) = self.tallies.get_mut(vertex.index()) else {
            self.protocol_violation(format!("completion of unknown {vertex}"), out);
            return;
        };
        if tally.completed.is_some() {
            debug!(dag = %self.id, vertex = %name, "duplicate vertex completion; ignoring");
            return;
        }
        tally.completed = Some(state);
        let kill_requested = tally.kill_requested;

        let fresh = match state {
            VertexState::Succeeded => {
                self.successful_vertices += 1;
                false
            }
            VertexState::Failed => {
                self.failed_vertices += 1;
                self.diagnostics.push(format!("Vertex {name} failed"));
                self.cause.adopt(TerminationCause::VertexFailure)
            }
            VertexState::Killed => {
                self.killed_vertices += 1;
                if kill_requested {
                    false
                } else {
                    // Killed without being asked: its output is missing, so
                    // the job cannot succeed.
                    self.diagnostics
                        .push(format!("Vertex {name} was killed without a kill request"));
                    self.cause.adopt(TerminationCause::VertexFailure)
                }
            }
            _ => {
                self.failed_vertices += 1;
                self.diagnostics.push(format!("Vertex {name} hit an internal error"));
                warn!(dag = %self.id, vertex = %name, "vertex reported ERROR; moving DAG to ERROR");
                self.enter_error(out);
                return;
            }
        };

        info!(
            dag = %self.id,
            vertex = %name,
            %state,
            successful = self.successful_vertices,
            failed = self.failed_vertices,
            killed = self.killed_vertices,
            total = self.tallies.len(),
            "vertex completion accounted"
        );
        if fresh {
            info!(dag = %self.id, cause = %self.cause, "termination cause set; killing unfinished vertices");
        }

        let propagation = termination::propagate(&self.tallies, self.cause, fresh);
        self.apply(propagation, out);
    }

    fn apply(&mut self, propagation: Propagation, out: &mut Vec<Event>) {
        for vertex in propagation.to_kill {
            self.request_kill(vertex, out);
        }
        if let Some(final_state) = propagation.final_state {
            self.finish(final_state, out);
        }
    }

    fn request_kill(&mut self, vertex: VertexId, out: &mut Vec<Event>) {
        if let Some(tally) = self.tallies.get_mut(vertex.index()) {
            tally.kill_requested = true;
            out.push(Event::Vertex(VertexEvent::new(vertex, VertexEventKind::Kill)));
        }
    }

    fn protocol_violation(&mut self, reason: String, out: &mut Vec<Event>) {
        warn!(
            dag = %self.id,
            state = %self.state,
            %reason,
            "protocol violation; moving DAG to ERROR"
        );
        self.diagnostics.push(format!("Protocol violation: {reason}"));
        self.enter_error(out);
    }

    /// Move to ERROR. Vertices that may be running are killed so their tasks
    /// release their slots.
    fn enter_error(&mut self, out: &mut Vec<Event>) {
        if matches!(self.state, DagState::Running | DagState::KillWait) {
            for vertex in termination::kill_targets(&self.tallies) {
                self.request_kill(vertex, out);
            }
        }
        self.finish(DagState::Error, out);
    }

    fn finish(&mut self, state: DagState, out: &mut Vec<Event>) {
        self.transition(state);
        info!(
            dag = %self.id,
            state = %state,
            cause = %self.cause,
            successful = self.successful_vertices,
            failed = self.failed_vertices,
            killed = self.killed_vertices,
            "DAG finished"
        );

        if !self.finish_notified {
            self.finish_notified = true;
            out.push(Event::DagFinished(DagFinished { dag: self.id, state }));
        }
    }
}
