//! Evaluator configuration and eager validation.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Marker file present only inside the ChromiumOS SDK chroot.
pub const CHROOT_VERSION_FILE: &str = "/etc/cros_chroot_version";

/// Raw evaluator options as collected from flags, environment or a config file.
///
/// Every field is optional here; [`EvaluatorConfig::from_options`] decides
/// which ones must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvaluatorOptions {
    pub base_dir: Option<PathBuf>,
    pub board: Option<String>,
    pub test_name: Option<String>,
    pub metric: Option<String>,
    pub metric_take_average: Option<bool>,
    pub reuse_eval: Option<bool>,
    pub chromium_dir: Option<PathBuf>,
    pub cros_dir: Option<PathBuf>,
    pub command_timeout_secs: Option<u64>,
    pub inside_chroot: Option<bool>,
    pub identity_file: Option<PathBuf>,
}

impl EvaluatorOptions {
    /// Load options from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merged_with(self, other: EvaluatorOptions) -> Self {
        Self {
            base_dir: other.base_dir.or(self.base_dir),
            board: other.board.or(self.board),
            test_name: other.test_name.or(self.test_name),
            metric: other.metric.or(self.metric),
            metric_take_average: other.metric_take_average.or(self.metric_take_average),
            reuse_eval: other.reuse_eval.or(self.reuse_eval),
            chromium_dir: other.chromium_dir.or(self.chromium_dir),
            cros_dir: other.cros_dir.or(self.cros_dir),
            command_timeout_secs: other.command_timeout_secs.or(self.command_timeout_secs),
            inside_chroot: other.inside_chroot.or(self.inside_chroot),
            identity_file: other.identity_file.or(self.identity_file),
        }
    }
}

/// Validated, immutable evaluator configuration.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EvaluatorConfig {
    pub base_dir: PathBuf,
    pub board: String,
    pub test_name: String,
    /// Slash- or dot-separated path into the report JSON.
    pub metric: String,
    pub metric_take_average: bool,
    pub reuse_eval: bool,
    /// Chromium checkout passed to `cros_sdk --chrome_root`.
    pub chromium_dir: PathBuf,
    /// ChromiumOS checkout hosting the SDK chroot.
    pub cros_dir: PathBuf,
    pub command_timeout: Option<Duration>,
    pub inside_chroot: bool,
    /// SSH private key for the DUT; ssh's own defaults apply when unset.
    pub identity_file: Option<PathBuf>,
}

impl EvaluatorConfig {
    /// Name used in configuration error messages.
    pub const OWNER: &'static str = "AutotestEvaluator";

    /// Options that must be present.
    pub const REQUIRED_ARGS: [&'static str; 6] = [
        "base_dir",
        "board",
        "test_name",
        "metric",
        "metric_take_average",
        "reuse_eval",
    ];

    /// Validate `options`, reporting every missing required field at once.
    pub fn from_options(options: EvaluatorOptions) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        if options.base_dir.is_none() {
            missing.push("base_dir");
        }
        if options.board.is_none() {
            missing.push("board");
        }
        if options.test_name.is_none() {
            missing.push("test_name");
        }
        if options.metric.is_none() {
            missing.push("metric");
        }
        if options.metric_take_average.is_none() {
            missing.push("metric_take_average");
        }
        if options.reuse_eval.is_none() {
            missing.push("reuse_eval");
        }

        match options {
            EvaluatorOptions {
                base_dir: Some(base_dir),
                board: Some(board),
                test_name: Some(test_name),
                metric: Some(metric),
                metric_take_average: Some(metric_take_average),
                reuse_eval: Some(reuse_eval),
                chromium_dir,
                cros_dir,
                command_timeout_secs,
                inside_chroot,
                identity_file,
            } => Ok(Self {
                chromium_dir: chromium_dir.unwrap_or_else(|| base_dir.join("chromium")),
                cros_dir: cros_dir.unwrap_or_else(|| base_dir.join("cros")),
                base_dir,
                board,
                test_name,
                metric,
                metric_take_average,
                reuse_eval,
                command_timeout: command_timeout_secs
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs),
                inside_chroot: inside_chroot.unwrap_or(false),
                identity_file,
            }),
            _ => Err(ConfigError::MissingArgs {
                owner: Self::OWNER,
                missing,
            }),
        }
    }

    /// Directory holding stored `results-chart.<label>.<n>-<repeat>.json` files.
    pub fn report_base_dir(&self) -> PathBuf {
        self.base_dir.join("reports")
    }
}

/// Whether this process runs inside the SDK chroot.
pub fn detect_inside_chroot() -> bool {
    Path::new(CHROOT_VERSION_FILE).exists()
}
