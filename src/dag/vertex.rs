// src/dag/vertex.rs

//! Vertex state machine.
//!
//! A vertex owns one pipeline stage: a fixed number of parallel tasks, its
//! lifecycle and its depth in the DAG. It is a pure, single-writer state
//! machine: every mutation happens inside [`VertexMachine::handle`], which
//! returns the events the shell must dispatch (task scheduling, kill
//! requests, notifications to target vertices and exactly one
//! `VERTEX_COMPLETED` to the DAG).

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::state::{TaskState, VertexState};
use crate::dag::status::{Progress, VertexStatus};
use crate::dag::step::Step;
use crate::engine::{
    DagEvent, DagId, Event, TaskEvent, TaskEventKind, TaskId, VertexEvent, VertexEventKind,
    VertexId,
};
use crate::plan::{ResourceHint, VertexPlan};
use crate::types::StartGating;

/// Result of recording a task completion.
enum TaskRecord {
    Recorded,
    Duplicate,
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct VertexMachine {
    dag: DagId,
    id: VertexId,
    name: String,
    state: VertexState,
    distance_from_root: u32,
    sources: Vec<VertexId>,
    targets: Vec<VertexId>,
    gating: StartGating,
    /// The DAG has asked this vertex to start.
    start_requested: bool,
    /// Sources that satisfied the start gate.
    ready_sources: HashSet<VertexId>,
    /// Tasks have been handed to the task layer.
    launched: bool,
    resource: ResourceHint,
    /// Terminal state per task index, `None` until reported.
    tasks: Vec<Option<TaskState>>,
    progress: Progress,
    diagnostics: Vec<String>,
}

impl VertexMachine {
    /// Build a vertex in `NEW` from its plan descriptor and the frozen graph.
    pub fn new(
        dag: DagId,
        id: VertexId,
        plan: &VertexPlan,
        graph: &DagGraph,
        gating: StartGating,
    ) -> Self {
        Self {
            dag,
            id,
            name: plan.name.clone(),
            state: VertexState::New,
            distance_from_root: graph.distance_from_root(id).unwrap_or(0),
            sources: graph.sources_of(id).to_vec(),
            targets: graph.targets_of(id).to_vec(),
            gating,
            start_requested: false,
            ready_sources: HashSet::new(),
            launched: false,
            resource: plan.resource.clone(),
            tasks: vec![None; plan.num_tasks],
            progress: Progress {
                total: plan.num_tasks,
                ..Progress::default()
            },
            diagnostics: Vec::new(),
        }
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> VertexState {
        self.state
    }

    pub fn distance_from_root(&self) -> u32 {
        self.distance_from_root
    }

    pub fn sources(&self) -> &[VertexId] {
        &self.sources
    }

    pub fn targets(&self) -> &[VertexId] {
        &self.targets
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn status(&self) -> VertexStatus {
        VertexStatus {
            id: self.id,
            name: self.name.clone(),
            state: self.state,
            distance_from_root: self.distance_from_root,
            progress: self.progress,
            diagnostics: self.diagnostics.clone(),
        }
    }

    /// Handle one event and return the resulting transition plus outbound
    /// events.
    ///
    /// Terminal vertices ignore everything except late task reports, which
    /// still update the counters. This keeps `VERTEX_COMPLETED` to exactly
    /// one per vertex.
    pub fn handle(&mut self, event: VertexEventKind) -> Step<VertexState> {
        let from = self.state;
        let mut out = Vec::new();

        match (self.state, event) {
            (VertexState::New, VertexEventKind::Init) => {
                self.transition(VertexState::Inited);
            }
            (VertexState::Inited, VertexEventKind::Start) => {
                self.start_requested = true;
                self.try_start(&mut out);
            }
            (state, VertexEventKind::SourceStarted { source }) if !state.is_terminal() => {
                self.on_source_event(source, StartGating::SourceStarted, &mut out);
            }
            (state, VertexEventKind::SourceSucceeded { source }) if !state.is_terminal() => {
                self.on_source_event(source, StartGating::SourceSucceeded, &mut out);
            }
            (VertexState::Running, VertexEventKind::TaskCompleted { task, state }) => {
                self.on_task_completed_running(task, state, &mut out);
            }
            (VertexState::KillWait, VertexEventKind::TaskCompleted { task, state }) => {
                self.on_task_completed_kill_wait(task, state, &mut out);
            }
            (
                VertexState::New | VertexState::Inited | VertexState::Running,
                VertexEventKind::Kill,
            ) => {
                self.begin_kill(&mut out);
            }
            (VertexState::KillWait, VertexEventKind::Kill) => {
                debug!(dag = %self.dag, vertex = %self.name, "kill already in progress; ignoring");
            }
            (VertexState::Error, event) => {
                debug!(dag = %self.dag, vertex = %self.name, ?event, "vertex in ERROR; ignoring event");
            }
            (state, VertexEventKind::TaskCompleted { task, state: task_state })
                if state.is_terminal() =>
            {
                // Late report, e.g. a sibling task finishing after a failure.
                if let TaskRecord::Recorded = self.record_task(task, task_state) {
                    debug!(
                        dag = %self.dag,
                        vertex = %self.name,
                        %task,
                        %task_state,
                        "late task completion recorded on terminal vertex"
                    );
                }
            }
            (state, event) if state.is_terminal() => {
                debug!(dag = %self.dag, vertex = %self.name, %state, ?event, "terminal vertex ignoring event");
            }
            (state, event) => {
                self.protocol_violation(format!("invalid event {event:?} in state {state}"), &mut out);
            }
        }

        Step::new(from, self.state, out)
    }

    fn transition(&mut self, to: VertexState) {
        debug!(
            dag = %self.dag,
            vertex = %self.name,
            from = %self.state,
            to = %to,
            "vertex transition"
        );
        self.state = to;
    }

    fn on_source_event(&mut self, source: VertexId, kind: StartGating, out: &mut Vec<Event>) {
        if !self.sources.contains(&source) {
            self.protocol_violation(
                format!("source notification from {source}, which is not a source"),
                out,
            );
            return;
        }

        if kind == self.gating {
            self.ready_sources.insert(source);
        }

        if self.state == VertexState::Inited {
            self.try_start(out);
        }
    }

    /// Start if the DAG asked for it and every source satisfied the gate.
    fn try_start(&mut self, out: &mut Vec<Event>) {
        if self.state != VertexState::Inited || !self.start_requested {
            return;
        }
        if !self.sources.iter().all(|s| self.ready_sources.contains(s)) {
            debug!(
                dag = %self.dag,
                vertex = %self.name,
                ready = self.ready_sources.len(),
                sources = self.sources.len(),
                "start requested; waiting on sources"
            );
            return;
        }

        self.transition(VertexState::Running);
        self.launched = true;
        self.progress.running = self.progress.total;

        if self.progress.total > 0 {
            let tasks = (0..self.progress.total)
                .map(|i| TaskId::new(self.id, i))
                .collect();
            out.push(Event::Task(TaskEvent {
                vertex: self.id,
                kind: TaskEventKind::Schedule {
                    tasks,
                    resource: self.resource.clone(),
                },
            }));
        }

        for &target in &self.targets {
            out.push(Event::Vertex(VertexEvent::new(
                target,
                VertexEventKind::SourceStarted { source: self.id },
            )));
        }

        if self.progress.total == 0 {
            self.finish(VertexState::Succeeded, out);
        }
    }

    fn record_task(&mut self, task: TaskId, state: TaskState) -> TaskRecord {
        if task.vertex != self.id || task.index >= self.tasks.len() {
            return TaskRecord::Invalid(format!(
                "completion for {task} which does not belong to this vertex"
            ));
        }
        if !self.launched {
            return TaskRecord::Invalid(format!("completion for {task} before tasks were scheduled"));
        }

        let slot = &mut self.tasks[task.index];
        if slot.is_some() {
            debug!(dag = %self.dag, vertex = %self.name, %task, "duplicate task completion; ignoring");
            return TaskRecord::Duplicate;
        }
        *slot = Some(state);

        self.progress.running = self.progress.running.saturating_sub(1);
        match state {
            TaskState::Succeeded => self.progress.succeeded += 1,
            TaskState::Failed => self.progress.failed += 1,
            TaskState::Killed => self.progress.killed += 1,
        }
        TaskRecord::Recorded
    }

    fn on_task_completed_running(&mut self, task: TaskId, state: TaskState, out: &mut Vec<Event>) {
        match self.record_task(task, state) {
            TaskRecord::Recorded => {}
            TaskRecord::Duplicate => return,
            TaskRecord::Invalid(reason) => {
                self.protocol_violation(reason, out);
                return;
            }
        }

        match state {
            TaskState::Succeeded => {
                if self.progress.succeeded == self.progress.total {
                    self.finish(VertexState::Succeeded, out);
                } else if self.progress.running == 0 {
                    self.diagnostics.push(format!(
                        "{} of {} tasks were killed",
                        self.progress.killed, self.progress.total
                    ));
                    self.finish(VertexState::Killed, out);
                }
            }
            TaskState::Failed => {
                warn!(dag = %self.dag, vertex = %self.name, %task, "task failed; failing vertex");
                self.diagnostics.push(format!("Task {task} failed"));
                self.kill_running_tasks(out);
                self.finish(VertexState::Failed, out);
            }
            TaskState::Killed => {
                if self.progress.running == 0 {
                    self.diagnostics.push(format!(
                        "{} of {} tasks were killed",
                        self.progress.killed, self.progress.total
                    ));
                    self.finish(VertexState::Killed, out);
                }
            }
        }
    }

    fn on_task_completed_kill_wait(&mut self, task: TaskId, state: TaskState, out: &mut Vec<Event>) {
        match self.record_task(task, state) {
            TaskRecord::Recorded => {
                if self.progress.running == 0 {
                    self.finish(VertexState::Killed, out);
                }
            }
            TaskRecord::Duplicate => {}
            TaskRecord::Invalid(reason) => self.protocol_violation(reason, out),
        }
    }

    fn begin_kill(&mut self, out: &mut Vec<Event>) {
        info!(dag = %self.dag, vertex = %self.name, state = %self.state, "kill requested");
        self.diagnostics.push("Vertex received kill request".to_string());
        self.transition(VertexState::KillWait);
        self.kill_running_tasks(out);

        // Nothing outstanding (never started, or zero tasks): done right away.
        if self.progress.running == 0 {
            self.finish(VertexState::Killed, out);
        }
    }

    fn kill_running_tasks(&self, out: &mut Vec<Event>) {
        if !self.launched {
            return;
        }
        let tasks: Vec<TaskId> = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_none())
            .map(|(i, _)| TaskId::new(self.id, i))
            .collect();
        if tasks.is_empty() {
            return;
        }
        out.push(Event::Task(TaskEvent {
            vertex: self.id,
            kind: TaskEventKind::Kill { tasks },
        }));
    }

    fn protocol_violation(&mut self, reason: String, out: &mut Vec<Event>) {
        warn!(
            dag = %self.dag,
            vertex = %self.name,
            state = %self.state,
            %reason,
            "protocol violation; moving vertex to ERROR"
        );
        self.diagnostics.push(format!("Protocol violation: {reason}"));
        self.kill_running_tasks(out);
        self.finish(VertexState::Error, out);
    }

    /// Enter a terminal state and report it to the DAG. Called at most once.
    fn finish(&mut self, state: VertexState, out: &mut Vec<Event>) {
        debug_assert!(state.is_terminal() && !self.state.is_terminal());
        self.transition(state);
        info!(
            dag = %self.dag,
            vertex = %self.name,
            state = %state,
            progress = %self.progress,
            "vertex completed"
        );

        out.push(Event::Dag(DagEvent::vertex_completed(self.dag, self.id, state)));

        if state == VertexState::Succeeded {
            for &target in &self.targets {
                out.push(Event::Vertex(VertexEvent::new(
                    target,
                    VertexEventKind::SourceSucceeded { source: self.id },
                )));
            }
        }
    }
}
