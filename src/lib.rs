// src/lib.rs

pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod plan;
pub mod types;

use tracing::info;

use crate::config::CoordinatorConfig;
use crate::dag::DagState;
use crate::engine::{DagCoordinator, DagId};
use crate::errors::Result;
use crate::plan::DagPlan;

/// Validate `plan` and build a coordinator for it.
///
/// This wires together:
/// - the dependency graph (rejecting malformed plans)
/// - one DAG machine and one vertex machine per plan vertex
/// - a dispatcher with the DAG, vertex and owner routers registered
///
/// Nothing runs until [`run`] (or `init` + `start`) is called. The task
/// layer should register its handler on
/// [`DagCoordinator::dispatcher`] first.
pub fn submit(id: DagId, plan: &DagPlan, config: &CoordinatorConfig) -> Result<DagCoordinator> {
    DagCoordinator::new(id, plan, config)
}

/// Drive a submitted DAG through INIT and START and wait for it to finish.
///
/// Must be called from within a Tokio runtime.
pub async fn run(coordinator: &DagCoordinator) -> Result<DagState> {
    coordinator.init()?;
    coordinator.start()?;

    let state = coordinator.wait_for_completion().await;
    info!(dag = %coordinator.id(), %state, "DAG run complete");
    Ok(state)
}
