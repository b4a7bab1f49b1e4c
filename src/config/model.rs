// src/config/model.rs

use serde::Deserialize;

use crate::types::{LogLevel, StartGating};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [coordinator]
/// start_gating = "source_started"
///
/// [dispatcher]
/// backlog_warn_threshold = 1024
///
/// [logging]
/// level = "debug"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCoordinatorConfig {
    #[serde(default)]
    pub coordinator: CoordinatorSection,

    #[serde(default)]
    pub dispatcher: DispatcherSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawCoordinatorConfig>` (see
/// `config::validate`) or `Default`, so holders can rely on its invariants.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub coordinator: CoordinatorSection,
    pub dispatcher: DispatcherSection,
    pub logging: LoggingSection,
}

impl CoordinatorConfig {
    pub(crate) fn new_unchecked(
        coordinator: CoordinatorSection,
        dispatcher: DispatcherSection,
        logging: LoggingSection,
    ) -> Self {
        Self {
            coordinator,
            dispatcher,
            logging,
        }
    }

    /// Convenience: the configured start gating policy.
    pub fn start_gating(&self) -> StartGating {
        self.coordinator.start_gating
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new_unchecked(
            CoordinatorSection::default(),
            DispatcherSection::default(),
            LoggingSection::default(),
        )
    }
}

/// `[coordinator]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoordinatorSection {
    /// `"source_started"` (default) or `"source_succeeded"`.
    #[serde(default)]
    pub start_gating: StartGating,
}

/// `[dispatcher]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherSection {
    /// Number of undelivered events queued for a single entity at which the
    /// dispatcher logs a warning. Must be >= 1.
    #[serde(default = "default_backlog_warn_threshold")]
    pub backlog_warn_threshold: usize,
}

fn default_backlog_warn_threshold() -> usize {
    1024
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            backlog_warn_threshold: default_backlog_warn_threshold(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSection {
    /// Applied by [`crate::logging::init_from_config`]. If `None`,
    /// `DAGCOORD_LOG` or `info` is used.
    #[serde(default)]
    pub level: Option<LogLevel>,
}
