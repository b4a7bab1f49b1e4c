// tests/graph_builder.rs

use std::collections::HashSet;

use proptest::prelude::*;

use dagcoord::dag::DagGraph;
use dagcoord::engine::VertexId;
use dagcoord::errors::DagError;
use dagcoord::plan::{ConnectionPattern, DagPlan, EdgePlan, SourceType, VertexPlan};
use dagcoord_test_utils::builders::{PlanBuilder, chain_plan, diamond_plan};

fn depth_of(graph: &DagGraph, name: &str) -> u32 {
    let id = graph.vertex_id(name).unwrap();
    graph.distance_from_root(id).unwrap()
}

#[test]
fn diamond_depths_match_topology_distance() {
    let graph = DagGraph::build(&diamond_plan()).unwrap();

    let depths: Vec<u32> = graph
        .vertex_ids()
        .map(|v| graph.distance_from_root(v).unwrap())
        .collect();
    assert_eq!(depths, vec![0, 0, 1, 2, 2, 3]);

    assert_eq!(graph.len(), 6);
    assert_eq!(graph.edges().len(), 6);
    assert_eq!(graph.roots(), vec![VertexId(0), VertexId(1)]);
}

#[test]
fn diamond_adjacency_is_symmetric() {
    let graph = DagGraph::build(&diamond_plan()).unwrap();
    let v3 = graph.vertex_id("vertex3").unwrap();

    assert_eq!(graph.sources_of(v3), &[VertexId(0), VertexId(1)]);
    assert_eq!(graph.targets_of(v3), &[VertexId(3), VertexId(4)]);

    for v in graph.vertex_ids() {
        for &t in graph.targets_of(v) {
            assert!(graph.sources_of(t).contains(&v), "{v} -> {t} missing back-reference");
        }
    }
}

#[test]
fn depth_is_longest_path_not_shortest() {
    // a -> b -> c and a -> c: c sits at depth 2.
    let plan = PlanBuilder::new("skip")
        .vertex("a", 1)
        .vertex("b", 1)
        .vertex("c", 1)
        .edge("a", "b")
        .edge("b", "c")
        .edge("a", "c")
        .build();
    let graph = DagGraph::build(&plan).unwrap();

    assert_eq!(depth_of(&graph, "a"), 0);
    assert_eq!(depth_of(&graph, "b"), 1);
    assert_eq!(depth_of(&graph, "c"), 2);
}

#[test]
fn parallel_edges_collapse_in_adjacency() {
    let plan = PlanBuilder::new("parallel")
        .vertex("a", 1)
        .vertex("b", 1)
        .edge("a", "b")
        .edge("a", "b")
        .build();
    let graph = DagGraph::build(&plan).unwrap();

    let a = graph.vertex_id("a").unwrap();
    let b = graph.vertex_id("b").unwrap();
    assert_eq!(graph.targets_of(a), &[b]);
    assert_eq!(graph.sources_of(b), &[a]);
    assert_eq!(graph.edges().len(), 2);
}

#[test]
fn edge_descriptors_are_kept_for_the_data_layer() {
    let plan = DagPlan::new("typed-edges")
        .with_vertex(VertexPlan::new("map", 2))
        .with_vertex(VertexPlan::new("reduce", 1))
        .with_edge(
            EdgePlan::new("shuffle", "map", "reduce")
                .with_connection_pattern(ConnectionPattern::Broadcast)
                .with_source_type(SourceType::Ephemeral),
        );
    let graph = DagGraph::build(&plan).unwrap();

    let edge = &graph.edges()[0];
    assert_eq!(edge.id, "shuffle");
    assert_eq!(edge.connection_pattern, ConnectionPattern::Broadcast);
    assert_eq!(edge.source_type, SourceType::Ephemeral);
}

#[test]
fn cycle_is_rejected_as_malformed_plan() {
    let plan = PlanBuilder::new("cyclic")
        .vertex("A", 1)
        .vertex("B", 1)
        .vertex("C", 1)
        .edge("A", "B")
        .edge("B", "C")
        .edge("C", "A")
        .build();

    match DagGraph::build(&plan) {
        Err(err @ DagError::DagCycle(_)) => {
            assert!(err.is_malformed_plan());
            let msg = err.to_string();
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains('A') || msg.contains('B') || msg.contains('C'));
        }
        Err(e) => panic!("Expected DagCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn self_loop_is_a_cycle() {
    let plan = PlanBuilder::new("self")
        .vertex("A", 1)
        .edge("A", "A")
        .build();

    let err = DagGraph::build(&plan).unwrap_err();
    assert!(matches!(err, DagError::DagCycle(_)), "got {err:?}");
}

#[test]
fn unknown_vertex_names_edge_and_vertex() {
    let plan = PlanBuilder::new("dangling")
        .vertex("A", 1)
        .edge_with_id("to-nowhere", "A", "ghost")
        .build();

    match DagGraph::build(&plan) {
        Err(DagError::UnknownVertex { edge, vertex }) => {
            assert_eq!(edge, "to-nowhere");
            assert_eq!(vertex, "ghost");
        }
        other => panic!("Expected UnknownVertex, got: {:?}", other),
    }
}

#[test]
fn duplicate_vertex_name_is_rejected() {
    let plan = PlanBuilder::new("dup")
        .vertex("A", 1)
        .vertex("A", 2)
        .build();

    let err = DagGraph::build(&plan).unwrap_err();
    assert!(matches!(err, DagError::DuplicateVertex(ref n) if n == "A"), "got {err:?}");
    assert!(err.is_malformed_plan());
}

#[test]
fn duplicate_edge_id_is_rejected() {
    let plan = PlanBuilder::new("dup-edge")
        .vertex("A", 1)
        .vertex("B", 1)
        .vertex("C", 1)
        .edge_with_id("e", "A", "B")
        .edge_with_id("e", "B", "C")
        .build();

    let err = DagGraph::build(&plan).unwrap_err();
    assert!(matches!(err, DagError::MalformedPlan(_)), "got {err:?}");
}

#[test]
fn empty_plan_is_rejected() {
    let err = DagGraph::build(&DagPlan::new("empty")).unwrap_err();
    assert!(matches!(err, DagError::MalformedPlan(_)), "got {err:?}");
    assert!(err.is_malformed_plan());
}

#[test]
fn topological_order_puts_sources_first() {
    let graph = DagGraph::build(&chain_plan(5, 1)).unwrap();
    let order = graph.topological_order();
    assert_eq!(
        order,
        &[VertexId(0), VertexId(1), VertexId(2), VertexId(3), VertexId(4)]
    );
}

// Acyclic plans by construction: vertex i may only consume from vertices < i.
fn acyclic_plan_strategy(max_vertices: usize) -> impl Strategy<Value = DagPlan> {
    (1..=max_vertices).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n).prop_map(
            move |raw_sources| {
                let mut builder = PlanBuilder::new("generated");
                for i in 0..n {
                    builder = builder.vertex(&format!("v{i}"), 1);
                }
                for (i, potential) in raw_sources.into_iter().enumerate() {
                    if i == 0 {
                        continue;
                    }
                    let sources: HashSet<usize> = potential.into_iter().map(|s| s % i).collect();
                    for s in sources {
                        builder = builder.edge(&format!("v{s}"), &format!("v{i}"));
                    }
                }
                builder.build()
            },
        )
    })
}

proptest! {
    #[test]
    fn depth_is_one_plus_max_source_depth(plan in acyclic_plan_strategy(12)) {
        let graph = DagGraph::build(&plan).unwrap();

        for v in graph.vertex_ids() {
            let depth = graph.distance_from_root(v).unwrap();
            let expected = graph
                .sources_of(v)
                .iter()
                .map(|s| graph.distance_from_root(*s).unwrap() + 1)
                .max()
                .unwrap_or(0);
            prop_assert_eq!(depth, expected);
        }
    }

    #[test]
    fn topological_order_respects_every_edge(plan in acyclic_plan_strategy(12)) {
        let graph = DagGraph::build(&plan).unwrap();
        let order = graph.topological_order();
        prop_assert_eq!(order.len(), graph.len());

        let position = |v: VertexId| order.iter().position(|x| *x == v).unwrap();
        for v in graph.vertex_ids() {
            for &t in graph.targets_of(v) {
                prop_assert!(position(v) < position(t));
            }
        }
    }

    #[test]
    fn back_edge_always_creates_cycle(plan in acyclic_plan_strategy(8)) {
        // Close the loop from the deepest vertex back to a root it descends from.
        let graph = DagGraph::build(&plan).unwrap();
        let deepest = graph
            .vertex_ids()
            .max_by_key(|v| graph.distance_from_root(*v).unwrap())
            .unwrap();
        prop_assume!(graph.distance_from_root(deepest).unwrap() > 0);

        // Walk sources back to a root.
        let mut root = deepest;
        while let Some(&s) = graph.sources_of(root).first() {
            root = s;
        }

        let mut cyclic = plan.clone();
        cyclic.edges.push(EdgePlan::new(
            "back",
            graph.name_of(deepest).unwrap(),
            graph.name_of(root).unwrap(),
        ));
        let err = DagGraph::build(&cyclic).unwrap_err();
        prop_assert!(matches!(err, DagError::DagCycle(_)));
    }
}
