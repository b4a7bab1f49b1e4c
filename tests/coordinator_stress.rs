// tests/coordinator_stress.rs
//
// Many diamond runs on a multi-threaded runtime, so lanes for different
// vertices really do race each other.

use std::error::Error;

use dagcoord::config::CoordinatorConfig;
use dagcoord::dag::DagState;
use dagcoord::engine::{DagCoordinator, DagId, TaskId, VertexId};
use dagcoord_test_utils::builders::diamond_plan;
use dagcoord_test_utils::fake_task_layer::FakeTaskLayer;
use dagcoord_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

const ROUNDS: u64 = 200;

fn task(vertex: usize, index: usize) -> TaskId {
    TaskId::new(VertexId(vertex), index)
}

/// Settle the dispatcher and check the bookkeeping every finished run shares.
async fn assert_settled(coord: &DagCoordinator, state: DagState, round: u64) {
    with_timeout(coord.await_idle()).await;

    let status = coord.status();
    assert!(state.is_terminal(), "round {round}: {state}");
    assert_eq!(status.state, state, "round {round}");
    assert_eq!(status.completed_vertices(), 6, "round {round}: {status:?}");
    assert_eq!(
        state,
        status.termination_cause.final_state(),
        "round {round}: {status:?}"
    );
    assert_eq!(coord.finish_notifications().len(), 1, "round {round}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn repeated_successful_runs() -> TestResult {
    init_tracing();
    for round in 0..ROUNDS {
        let coord = dagcoord::submit(DagId(round), &diamond_plan(), &CoordinatorConfig::default())?;
        FakeTaskLayer::completing().install(&coord);

        let state = with_timeout(dagcoord::run(&coord)).await?;
        assert_eq!(state, DagState::Succeeded, "round {round}");
        assert_settled(&coord, state, round).await;
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn repeated_runs_with_failing_task() -> TestResult {
    init_tracing();
    for round in 0..ROUNDS {
        let coord = dagcoord::submit(DagId(round), &diamond_plan(), &CoordinatorConfig::default())?;
        FakeTaskLayer::completing()
            .failing(task(1, 1))
            .install(&coord);

        let state = with_timeout(dagcoord::run(&coord)).await?;
        assert_eq!(state, DagState::Failed, "round {round}");
        assert_settled(&coord, state, round).await;
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn repeated_runs_killed_while_starting() -> TestResult {
    init_tracing();
    for round in 0..ROUNDS {
        let coord = dagcoord::submit(DagId(round), &diamond_plan(), &CoordinatorConfig::default())?;
        // Every other round also has a failing task racing the kill.
        let layer = FakeTaskLayer::completing();
        let layer = if round % 2 == 0 {
            layer
        } else {
            layer.failing(task(1, 1))
        };
        layer.install(&coord);

        coord.init()?;
        coord.start()?;
        coord.kill()?;
        let state = with_timeout(coord.wait_for_completion()).await;
        assert_settled(&coord, state, round).await;
    }
    Ok(())
}
