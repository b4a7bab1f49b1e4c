use std::str::FromStr;
use serde::Deserialize;

/// When a vertex with incoming edges is allowed to leave `INITED`.
///
/// - `SourceStarted`: as soon as every source vertex has started running
///   (default). Downstream vertices can then begin acquiring slots while
///   their inputs are still being produced.
/// - `SourceSucceeded`: only once every source vertex has succeeded.
///
/// Vertices without sources start on DAG `START` under either policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartGating {
    SourceStarted,
    SourceSucceeded,
}

impl Default for StartGating {
    fn default() -> Self {
        StartGating::SourceStarted
    }
}

impl FromStr for StartGating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "source_started" => Ok(StartGating::SourceStarted),
            "source_succeeded" => Ok(StartGating::SourceSucceeded),
            other => Err(format!(
                "invalid start_gating: {other} (expected \"source_started\" or \"source_succeeded\")"
            )),
        }
    }
}

/// Log level as accepted in the `[logging]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
