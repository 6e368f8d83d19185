//! autoeval core: autotest benchmark evaluation
//!
//! Runs an autotest on a ChromiumOS device under test, either directly on
//! the DUT or through `test_that` inside the SDK chroot, pulls one metric
//! out of the resulting chart JSON and summarises repeated runs.
//!
//! External tools are reached through narrow collaborator traits
//! ([`CommandRunner`], [`RemoteShell`], [`FileFinder`]); [`fakes`] has
//! scripted implementations for tests.

pub mod board;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod evaluator;
pub mod fakes;
pub mod finder;
pub mod remote;
pub mod report;
pub mod score;
pub mod state;
pub mod telemetry;

pub use command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use config::{detect_inside_chroot, EvaluatorConfig, EvaluatorOptions};
pub use device::Device;
pub use error::{CommandError, ConfigError, EvalError, ReportError, Result, StateError};
pub use evaluator::AutotestEvaluator;
pub use finder::{FileFinder, FindCommand};
pub use remote::{RemoteShell, SshRemote};
pub use report::{metric_value, read_metric, scan_reports, StoredReport, RESULT_FILENAME};
pub use score::{summarize, Score, Summary};
pub use state::{Evaluation, EvaluationState};
pub use telemetry::init_tracing;

/// autoeval-core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
