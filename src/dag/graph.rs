// src/dag/graph.rs

//! One-time translation of a [`DagPlan`] into adjacency lists and per-vertex
//! depth.
//!
//! Building the graph is also where the plan is validated: unknown vertex
//! names, duplicate names, self-loops and cycles all fail here, before any
//! state machine exists.

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::engine::VertexId;
use crate::errors::{DagError, Result};
use crate::plan::{DagPlan, EdgePlan};

/// Internal node structure: stores immediate sources, targets and depth.
#[derive(Debug, Clone)]
struct VertexNode {
    name: String,
    /// Vertices this one consumes from.
    sources: Vec<VertexId>,
    /// Vertices consuming from this one.
    targets: Vec<VertexId>,
    distance_from_root: u32,
}

/// Frozen topology of a validated plan.
///
/// Vertices are addressed by [`VertexId`], their ordinal in the plan, so the
/// adjacency lists are plain indices and never own anything.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: Vec<VertexNode>,
    by_name: HashMap<String, VertexId>,
    edges: Vec<EdgePlan>,
    topological_order: Vec<VertexId>,
}

impl DagGraph {
    /// Validate `plan` and compute adjacency plus `distance_from_root`.
    ///
    /// Fails with a malformed-plan error (see
    /// [`DagError::is_malformed_plan`]) on an empty plan, duplicate vertex
    /// names or edge ids, edges naming unknown vertices, and cycles.
    pub fn build(plan: &DagPlan) -> Result<Self> {
        ensure_has_vertices(plan)?;
        let by_name = index_vertices(plan)?;
        let resolved = resolve_edges(plan, &by_name)?;

        let mut nodes: Vec<VertexNode> = plan
            .vertices
            .iter()
            .map(|v| VertexNode {
                name: v.name.clone(),
                sources: Vec::new(),
                targets: Vec::new(),
                distance_from_root: 0,
            })
            .collect();

        // Edge direction: source -> destination. Node indices line up with
        // vertex ordinals because nodes are added in plan order.
        let mut graph: DiGraph<VertexId, ()> =
            DiGraph::with_capacity(plan.vertices.len(), resolved.len());
        for i in 0..plan.vertices.len() {
            graph.add_node(VertexId(i));
        }

        for &(src, dst) in &resolved {
            graph.add_edge(NodeIndex::new(src.index()), NodeIndex::new(dst.index()), ());

            // Parallel edges between the same pair collapse into one adjacency.
            if !nodes[src.index()].targets.contains(&dst) {
                nodes[src.index()].targets.push(dst);
                nodes[dst.index()].sources.push(src);
            }
        }

        let order = match toposort(&graph, None) {
            Ok(order) => order,
            Err(cycle) => {
                let vertex = graph[cycle.node_id()];
                return Err(DagError::DagCycle(format!(
                    "cycle detected in vertex DAG involving vertex '{}'",
                    nodes[vertex.index()].name
                )));
            }
        };

        let topological_order: Vec<VertexId> = order.into_iter().map(|n| graph[n]).collect();

        // Longest path from any root: every source precedes its targets in
        // topological order, so its depth is final by the time we get here.
        for &vertex in &topological_order {
            let depth = nodes[vertex.index()]
                .sources
                .iter()
                .map(|s| nodes[s.index()].distance_from_root + 1)
                .max()
                .unwrap_or(0);
            nodes[vertex.index()].distance_from_root = depth;
        }

        for edge in &plan.edges {
            debug!(
                plan = %plan.name,
                edge = %edge.id,
                source = %edge.source,
                destination = %edge.destination,
                connection_pattern = ?edge.connection_pattern,
                source_type = ?edge.source_type,
                "edge"
            );
        }

        debug!(
            plan = %plan.name,
            vertices = nodes.len(),
            edges = plan.edges.len(),
            "built dependency graph"
        );

        Ok(Self {
            nodes,
            by_name,
            edges: plan.edges.clone(),
            topological_order,
        })
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All vertex ids in ordinal order.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        (0..self.nodes.len()).map(VertexId)
    }

    pub fn vertex_id(&self, name: &str) -> Option<VertexId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, vertex: VertexId) -> Option<&str> {
        self.nodes.get(vertex.index()).map(|n| n.name.as_str())
    }

    /// Immediate sources of a vertex (its incoming edges).
    pub fn sources_of(&self, vertex: VertexId) -> &[VertexId] {
        self.nodes
            .get(vertex.index())
            .map(|n| n.sources.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate targets of a vertex (its outgoing edges).
    pub fn targets_of(&self, vertex: VertexId) -> &[VertexId] {
        self.nodes
            .get(vertex.index())
            .map(|n| n.targets.as_slice())
            .unwrap_or(&[])
    }

    pub fn distance_from_root(&self, vertex: VertexId) -> Option<u32> {
        self.nodes.get(vertex.index()).map(|n| n.distance_from_root)
    }

    /// Vertices without incoming edges.
    pub fn roots(&self) -> Vec<VertexId> {
        self.vertex_ids()
            .filter(|v| self.sources_of(*v).is_empty())
            .collect()
    }

    pub fn topological_order(&self) -> &[VertexId] {
        &self.topological_order
    }

    pub fn edges(&self) -> &[EdgePlan] {
        &self.edges
    }
}

fn ensure_has_vertices(plan: &DagPlan) -> Result<()> {
    if plan.vertices.is_empty() {
        return Err(DagError::MalformedPlan(format!(
            "plan '{}' must contain at least one vertex",
            plan.name
        )));
    }
    Ok(())
}

fn index_vertices(plan: &DagPlan) -> Result<HashMap<String, VertexId>> {
    let mut by_name = HashMap::with_capacity(plan.vertices.len());
    for (i, vertex) in plan.vertices.iter().enumerate() {
        if by_name.insert(vertex.name.clone(), VertexId(i)).is_some() {
            return Err(DagError::DuplicateVertex(vertex.name.clone()));
        }
    }
    Ok(by_name)
}

fn resolve_edges(
    plan: &DagPlan,
    by_name: &HashMap<String, VertexId>,
) -> Result<Vec<(VertexId, VertexId)>> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut resolved = Vec::with_capacity(plan.edges.len());

    for edge in &plan.edges {
        if !seen_ids.insert(edge.id.as_str()) {
            return Err(DagError::MalformedPlan(format!(
                "duplicate edge id '{}'",
                edge.id
            )));
        }

        let lookup = |name: &str| {
            by_name
                .get(name)
                .copied()
                .ok_or_else(|| DagError::UnknownVertex {
                    edge: edge.id.clone(),
                    vertex: name.to_string(),
                })
        };
        let src = lookup(&edge.source)?;
        let dst = lookup(&edge.destination)?;

        if src == dst {
            return Err(DagError::DagCycle(format!(
                "edge '{}' connects vertex '{}' to itself",
                edge.id, edge.source
            )));
        }

        resolved.push((src, dst));
    }

    Ok(resolved)
}
