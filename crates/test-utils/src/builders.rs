#![allow(dead_code)]

use dagcoord::config::{CoordinatorConfig, RawCoordinatorConfig};
use dagcoord::plan::{DagPlan, EdgePlan, VertexPlan};
use dagcoord::types::StartGating;

/// Builder for `DagPlan` to simplify test setup.
///
/// Edges get sequential ids (`e1`, `e2`, ...) unless one is given.
pub struct PlanBuilder {
    plan: DagPlan,
    next_edge: usize,
}

impl PlanBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            plan: DagPlan::new(name),
            next_edge: 1,
        }
    }

    pub fn vertex(mut self, name: &str, num_tasks: usize) -> Self {
        self.plan.vertices.push(VertexPlan::new(name, num_tasks));
        self
    }

    pub fn vertex_plan(mut self, vertex: VertexPlan) -> Self {
        self.plan.vertices.push(vertex);
        self
    }

    pub fn edge(mut self, source: &str, destination: &str) -> Self {
        let id = format!("e{}", self.next_edge);
        self.next_edge += 1;
        self.plan.edges.push(EdgePlan::new(id, source, destination));
        self
    }

    pub fn edge_with_id(mut self, id: &str, source: &str, destination: &str) -> Self {
        self.plan.edges.push(EdgePlan::new(id, source, destination));
        self
    }

    pub fn build(self) -> DagPlan {
        self.plan
    }
}

/// The six-vertex, six-edge diamond used throughout the tests:
///
/// ```text
/// vertex1   vertex2
///      \     /
///      vertex3
///      /     \
/// vertex4   vertex5
///      \     /
///      vertex6
/// ```
///
/// Every vertex has two tasks. Depths are `{0, 0, 1, 2, 2, 3}`.
pub fn diamond_plan() -> DagPlan {
    PlanBuilder::new("diamond")
        .vertex("vertex1", 2)
        .vertex("vertex2", 2)
        .vertex("vertex3", 2)
        .vertex("vertex4", 2)
        .vertex("vertex5", 2)
        .vertex("vertex6", 2)
        .edge("vertex1", "vertex3")
        .edge("vertex2", "vertex3")
        .edge("vertex3", "vertex4")
        .edge("vertex3", "vertex5")
        .edge("vertex4", "vertex6")
        .edge("vertex5", "vertex6")
        .build()
}

/// A linear chain `v0 -> v1 -> ... -> v{n-1}` with `tasks` tasks per vertex.
pub fn chain_plan(len: usize, tasks: usize) -> DagPlan {
    let mut builder = PlanBuilder::new("chain");
    for i in 0..len {
        builder = builder.vertex(&format!("v{i}"), tasks);
    }
    for i in 1..len {
        builder = builder.edge(&format!("v{}", i - 1), &format!("v{i}"));
    }
    builder.build()
}

/// Validated config with the given gating policy and defaults elsewhere.
pub fn config_with_gating(gating: StartGating) -> CoordinatorConfig {
    let mut raw = RawCoordinatorConfig::default();
    raw.coordinator.start_gating = gating;
    CoordinatorConfig::try_from(raw).expect("Failed to build valid config from builder")
}
