use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use dagcoord::dag::TaskState;
use dagcoord::engine::{
    DagCoordinator, Dispatcher, Event, EventHandler, EventKind, TaskEvent, TaskEventKind, TaskId,
    VertexEvent,
};

/// What the fake does with scheduled tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskBehaviour {
    /// Record only; the test reports completions itself.
    Hold,
    /// Report every scheduled task as SUCCEEDED (or FAILED if listed).
    Complete,
}

/// A fake task layer that:
/// - records every schedule / kill request it receives
/// - optionally completes scheduled tasks right away
/// - optionally acknowledges kill requests with KILLED completions
pub struct FakeTaskLayer {
    behaviour: TaskBehaviour,
    ack_kills: bool,
    failing: HashSet<TaskId>,
    scheduled: Mutex<Vec<TaskId>>,
    killed: Mutex<Vec<TaskId>>,
    events: Mutex<Vec<TaskEvent>>,
}

impl FakeTaskLayer {
    /// Records requests and acknowledges kills; never completes on its own.
    pub fn holding() -> Self {
        Self::new(TaskBehaviour::Hold)
    }

    /// Completes every scheduled task successfully.
    pub fn completing() -> Self {
        Self::new(TaskBehaviour::Complete)
    }

    fn new(behaviour: TaskBehaviour) -> Self {
        Self {
            behaviour,
            ack_kills: true,
            failing: HashSet::new(),
            scheduled: Mutex::new(Vec::new()),
            killed: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Report `task` as FAILED instead of SUCCEEDED.
    pub fn failing(mut self, task: TaskId) -> Self {
        self.failing.insert(task);
        self
    }

    /// Leave kill requests unanswered, so vertices stay in KILL_WAIT.
    pub fn without_kill_ack(mut self) -> Self {
        self.ack_kills = false;
        self
    }

    /// Register on the coordinator's dispatcher and return a handle for
    /// inspection.
    pub fn install(self, coordinator: &DagCoordinator) -> Arc<Self> {
        let layer = Arc::new(self);
        coordinator
            .dispatcher()
            .register(EventKind::Task, Arc::clone(&layer) as Arc<dyn EventHandler>);
        layer
    }

    pub fn scheduled(&self) -> Vec<TaskId> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn killed(&self) -> Vec<TaskId> {
        self.killed.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().unwrap().clone()
    }

    fn report(dispatcher: &Dispatcher, task: TaskId, state: TaskState) {
        dispatcher
            .dispatch(Event::Vertex(VertexEvent::task_completed(task, state)))
            .expect("dispatch task completion");
    }
}

impl EventHandler for FakeTaskLayer {
    fn handle(&self, event: Event, dispatcher: &Dispatcher) {
        let Event::Task(event) = event else {
            return;
        };
        self.events.lock().unwrap().push(event.clone());

        match event.kind {
            TaskEventKind::Schedule { tasks, .. } => {
                self.scheduled.lock().unwrap().extend(tasks.iter().copied());
                if self.behaviour == TaskBehaviour::Complete {
                    for task in tasks {
                        let state = if self.failing.contains(&task) {
                            TaskState::Failed
                        } else {
                            TaskState::Succeeded
                        };
                        Self::report(dispatcher, task, state);
                    }
                }
            }
            TaskEventKind::Kill { tasks } => {
                self.killed.lock().unwrap().extend(tasks.iter().copied());
                if self.ack_kills {
                    for task in tasks {
                        Self::report(dispatcher, task, TaskState::Killed);
                    }
                }
            }
        }
    }
}
