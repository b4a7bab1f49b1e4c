// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Only construction-time problems (bad plans, bad config) and dispatcher
//! misuse are errors. Runtime protocol violations are represented by the
//! `ERROR` state of the DAG or vertex, never by a returned error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Malformed plan: {0}")]
    MalformedPlan(String),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("Edge '{edge}' references unknown vertex '{vertex}'")]
    UnknownVertex { edge: String, vertex: String },

    #[error("Duplicate vertex name in plan: {0}")]
    DuplicateVertex(String),

    #[error("Dispatcher has been stopped")]
    DispatcherStopped,

    #[error("No Tokio runtime available to run dispatcher lanes")]
    NoRuntime,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl DagError {
    /// Whether this error means the plan itself must be fixed and resubmitted.
    pub fn is_malformed_plan(&self) -> bool {
        matches!(
            self,
            DagError::MalformedPlan(_)
                | DagError::DagCycle(_)
                | DagError::UnknownVertex { .. }
                | DagError::DuplicateVertex(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DagError>;
