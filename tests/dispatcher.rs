// tests/dispatcher.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dagcoord::dag::{DagState, TaskState};
use dagcoord::engine::{
    DagFinished, DagId, Dispatcher, Event, EventHandler, EventKind, TaskId, VertexEvent,
    VertexEventKind, VertexId,
};
use dagcoord::errors::DagError;
use dagcoord_test_utils::{init_tracing, with_timeout};

/// Records `(vertex, task index)` for every task completion it sees.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(usize, usize)>>,
}

impl EventHandler for Recorder {
    fn handle(&self, event: Event, _dispatcher: &Dispatcher) {
        if let Event::Vertex(VertexEvent {
            kind: VertexEventKind::TaskCompleted { task, .. },
            ..
        }) = event
        {
            self.seen.lock().unwrap().push((task.vertex.index(), task.index));
        }
    }
}

fn completion(vertex: usize, index: usize) -> Event {
    Event::Vertex(VertexEvent::task_completed(
        TaskId::new(VertexId(vertex), index),
        TaskState::Succeeded,
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn events_for_one_entity_arrive_in_order() {
    init_tracing();
    let dispatcher = Dispatcher::new(16);
    let recorder = Arc::new(Recorder::default());
    dispatcher.register(EventKind::Vertex, recorder.clone());

    for i in 0..200 {
        dispatcher.dispatch(completion(i % 4, i)).unwrap();
    }
    with_timeout(dispatcher.await_idle()).await;

    let seen = recorder.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 200);
    for vertex in 0..4 {
        let indices: Vec<usize> = seen
            .iter()
            .filter(|(v, _)| *v == vertex)
            .map(|(_, i)| *i)
            .collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(indices, sorted, "vertex {vertex} saw events out of order");
    }
}

/// Each event fans out into `remaining` more events on the next vertex.
struct Cascade {
    handled: AtomicUsize,
}

impl EventHandler for Cascade {
    fn handle(&self, event: Event, dispatcher: &Dispatcher) {
        self.handled.fetch_add(1, Ordering::SeqCst);
        if let Event::Vertex(VertexEvent {
            vertex,
            kind: VertexEventKind::TaskCompleted { task, state },
        }) = event
        {
            if task.index > 0 {
                let next = TaskId::new(VertexId(vertex.index() + 1), task.index - 1);
                std::thread::sleep(Duration::from_millis(1));
                dispatcher
                    .dispatch(Event::Vertex(VertexEvent::task_completed(next, state)))
                    .unwrap();
            }
        }
    }
}

#[tokio::test]
async fn await_idle_waits_for_follow_up_events() {
    init_tracing();
    let dispatcher = Dispatcher::default();
    let cascade = Arc::new(Cascade {
        handled: AtomicUsize::new(0),
    });
    dispatcher.register(EventKind::Vertex, cascade.clone());

    dispatcher.dispatch(completion(0, 10)).unwrap();
    with_timeout(dispatcher.await_idle()).await;

    assert_eq!(cascade.handled.load(Ordering::SeqCst), 11);
    assert_eq!(dispatcher.in_flight(), 0);
}

#[tokio::test]
async fn await_idle_returns_immediately_when_nothing_dispatched() {
    let dispatcher = Dispatcher::default();
    with_timeout(dispatcher.await_idle()).await;
}

#[tokio::test]
async fn unregistered_kind_is_dropped() {
    init_tracing();
    let dispatcher = Dispatcher::default();

    dispatcher
        .dispatch(Event::DagFinished(DagFinished {
            dag: DagId(3),
            state: DagState::Succeeded,
        }))
        .unwrap();

    with_timeout(dispatcher.await_idle()).await;
    assert_eq!(dispatcher.in_flight(), 0);
}

struct Panicking;

impl EventHandler for Panicking {
    fn handle(&self, _event: Event, _dispatcher: &Dispatcher) {
        panic!("handler blew up");
    }
}

#[tokio::test]
async fn panicking_handler_does_not_wedge_the_lane() {
    init_tracing();
    let dispatcher = Dispatcher::default();
    dispatcher.register(EventKind::Vertex, Arc::new(Panicking));

    dispatcher.dispatch(completion(0, 0)).unwrap();
    dispatcher.dispatch(completion(0, 1)).unwrap();
    with_timeout(dispatcher.await_idle()).await;

    // Same lane keeps working with a healthy handler.
    let recorder = Arc::new(Recorder::default());
    dispatcher.register(EventKind::Vertex, recorder.clone());
    dispatcher.dispatch(completion(0, 2)).unwrap();
    with_timeout(dispatcher.await_idle()).await;

    assert_eq!(*recorder.seen.lock().unwrap(), vec![(0, 2)]);
}

#[tokio::test]
async fn stop_drains_and_rejects_new_events() {
    init_tracing();
    let dispatcher = Dispatcher::default();
    let recorder = Arc::new(Recorder::default());
    dispatcher.register(EventKind::Vertex, recorder.clone());

    for i in 0..10 {
        dispatcher.dispatch(completion(0, i)).unwrap();
    }
    with_timeout(dispatcher.stop()).await;

    assert_eq!(recorder.seen.lock().unwrap().len(), 10);
    let err = dispatcher.dispatch(completion(0, 99)).unwrap_err();
    assert!(matches!(err, DagError::DispatcherStopped));

    // Stopping twice is harmless.
    with_timeout(dispatcher.stop()).await;
}

#[test]
fn dispatch_outside_runtime_fails() {
    let dispatcher = Dispatcher::default();
    let err = dispatcher.dispatch(completion(0, 0)).unwrap_err();
    assert!(matches!(err, DagError::NoRuntime));
    assert_eq!(dispatcher.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_delivery_after_stop_returns() {
    init_tracing();
    let dispatcher = Dispatcher::default();
    let recorder = Arc::new(Recorder::default());
    dispatcher.register(EventKind::Vertex, recorder.clone());

    // Senders keep addressing fresh vertices, so new lanes are being created
    // while `stop` drains the lane map.
    let senders: Vec<_> = (0..4)
        .map(|s| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let mut accepted: usize = 0;
                for i in 0..500 {
                    if dispatcher.dispatch(completion(s * 500 + i, i)).is_ok() {
                        accepted += 1;
                    }
                    tokio::task::yield_now().await;
                }
                accepted
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(5)).await;
    with_timeout(dispatcher.stop()).await;
    let seen_at_stop = recorder.seen.lock().unwrap().len();

    let mut accepted: usize = 0;
    for sender in senders {
        accepted += with_timeout(sender).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(recorder.seen.lock().unwrap().len(), seen_at_stop);
    assert_eq!(seen_at_stop, accepted);
    assert_eq!(dispatcher.in_flight(), 0);
}
