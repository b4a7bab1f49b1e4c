// src/config/mod.rs

//! Configuration loading and validation for dagcoord.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants like sane dispatcher limits (`validate.rs`).
//!
//! The job plan itself is not part of this file; it is handed to the
//! coordinator as a [`crate::plan::DagPlan`] by the owning application.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    CoordinatorConfig, CoordinatorSection, DispatcherSection, LoggingSection,
    RawCoordinatorConfig,
};
