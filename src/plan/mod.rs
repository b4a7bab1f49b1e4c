// src/plan/mod.rs

//! Declarative job plan handed to the coordinator.
//!
//! A plan is a set of vertex descriptors plus edge descriptors between them.
//! It is validated and turned into adjacency/depth information by
//! [`crate::dag::graph::DagGraph::build`]; the plan itself is never mutated
//! afterwards.

pub mod model;

pub use model::{ConnectionPattern, DagPlan, EdgePlan, ResourceHint, SourceType, VertexPlan};
