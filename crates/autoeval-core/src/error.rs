//! Error taxonomy for autotest evaluation.

use std::path::PathBuf;

/// Errors raised while validating evaluator configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing command line arguments for {owner}: {}", .missing.join(", "))]
    MissingArgs {
        owner: &'static str,
        missing: Vec<&'static str>,
    },

    #[error("invalid device address: {0}")]
    InvalidDevice(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from launching an external command.
///
/// A non-zero exit status is *not* an error at this level; it is reported
/// through [`crate::command::CommandOutput::success`].
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command is empty")]
    EmptyCommand,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {secs} seconds")]
    Timeout { program: String, secs: u64 },

    #[error("unexpected command: {0}")]
    Unexpected(String),
}

/// Errors from reading a metric out of a JSON report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to read report {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("metric key {key:?} not found (metric path {metric})")]
    MissingKey { metric: String, key: String },

    #[error("metric {metric} is not numeric: {value}")]
    NotNumeric {
        metric: String,
        value: serde_json::Value,
    },

    #[error("metric {metric} is an empty list; nothing to average")]
    EmptyList { metric: String },
}

/// Invalid evaluation lifecycle transition.
#[derive(Debug, thiserror::Error)]
#[error("invalid evaluation transition: {current} -> {requested}")]
pub struct StateError {
    pub current: String,
    pub requested: String,
}

/// Errors that abort an evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("run {nth}/{repeat} of {test_name} failed on both DUT and host")]
    RunFailed {
        test_name: String,
        nth: usize,
        repeat: usize,
    },

    #[error("repeat count must be at least 1")]
    ZeroRepeat,

    #[error("report error: {0}")]
    Report(#[from] ReportError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for evaluator operations.
pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_args_names_owner_and_fields() {
        let err = ConfigError::MissingArgs {
            owner: "AutotestEvaluator",
            missing: vec!["board", "metric"],
        };
        let msg = err.to_string();
        assert!(msg.contains("Missing command line"));
        assert!(msg.contains("AutotestEvaluator"));
        assert!(msg.contains("board"));
        assert!(msg.contains("metric"));
    }

    #[test]
    fn test_run_failed_display() {
        let err = EvalError::RunFailed {
            test_name: "graphics_WebGLAquarium".to_string(),
            nth: 2,
            repeat: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("2/3"));
        assert!(msg.contains("graphics_WebGLAquarium"));
    }

    #[test]
    fn test_state_error_display() {
        let err = StateError {
            current: "succeeded".to_string(),
            requested: "running".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid evaluation transition: succeeded -> running"
        );
    }
}
