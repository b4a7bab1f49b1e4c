// src/config/validate.rs

use crate::config::model::{CoordinatorConfig, RawCoordinatorConfig};
use crate::errors::{DagError, Result};

impl TryFrom<RawCoordinatorConfig> for CoordinatorConfig {
    type Error = crate::errors::DagError;

    fn try_from(raw: RawCoordinatorConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(CoordinatorConfig::new_unchecked(
            raw.coordinator,
            raw.dispatcher,
            raw.logging,
        ))
    }
}

fn validate_raw_config(cfg: &RawCoordinatorConfig) -> Result<()> {
    // start_gating and logging.level are strongly typed and validated during
    // deserialization, so only numeric limits are checked here.
    validate_dispatcher(cfg)?;
    Ok(())
}

fn validate_dispatcher(cfg: &RawCoordinatorConfig) -> Result<()> {
    if cfg.dispatcher.backlog_warn_threshold == 0 {
        return Err(DagError::ConfigError(
            "[dispatcher].backlog_warn_threshold must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
