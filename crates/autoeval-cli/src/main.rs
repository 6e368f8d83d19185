//! autoeval - autotest benchmark evaluation CLI
//!
//! ## Commands
//!
//! - `evaluate`: run a benchmark N times on a DUT and print the score
//! - `check-last`: score a previous evaluation from stored reports
//! - `run-device` / `run-host`: a single run, DUT-side or via `test_that`
//! - `extract`: pull the configured metric out of a report file
//! - `setup-board`: bootstrap the ChromiumOS checkout and board
//! - `gen-chain`: write the unknown-critical-extension certificate fixture
//!
//! Evaluator options come from flags, `AUTOEVAL_*` environment variables or
//! a JSON `--config` file; flags and environment win over the file.

use anyhow::{bail, Context, Result};
use autoeval_core::{
    detect_inside_chroot, read_metric, AutotestEvaluator, Device, EvaluatorOptions,
    ProcessRunner, Score,
};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "autoeval")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run autotest benchmarks on ChromiumOS devices and score them", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    evaluator: EvaluatorArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct EvaluatorArgs {
    /// JSON file with evaluator options
    #[arg(long, global = true, env = "AUTOEVAL_CONFIG")]
    config: Option<PathBuf>,

    /// Working directory for reports and checkouts
    #[arg(long, global = true, env = "AUTOEVAL_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Board name, e.g. samus
    #[arg(long, global = true, env = "AUTOEVAL_BOARD")]
    board: Option<String>,

    /// Autotest name, e.g. graphics_WebGLAquarium
    #[arg(long, global = true, env = "AUTOEVAL_TEST_NAME")]
    test_name: Option<String>,

    /// Metric path inside the report, e.g. avg_fps_1000_fishes/summary/value
    #[arg(long, global = true, env = "AUTOEVAL_METRIC")]
    metric: Option<String>,

    /// Average the metric when it is a list
    #[arg(long, global = true, env = "AUTOEVAL_METRIC_TAKE_AVERAGE")]
    metric_take_average: Option<bool>,

    /// Reuse a previous evaluation's reports when available
    #[arg(long, global = true, env = "AUTOEVAL_REUSE_EVAL")]
    reuse_eval: Option<bool>,

    /// Chromium checkout (default: <base_dir>/chromium)
    #[arg(long, global = true, env = "AUTOEVAL_CHROMIUM_DIR")]
    chromium_dir: Option<PathBuf>,

    /// ChromiumOS checkout (default: <base_dir>/cros)
    #[arg(long, global = true, env = "AUTOEVAL_CROS_DIR")]
    cros_dir: Option<PathBuf>,

    /// Per-command timeout for benchmark runs in seconds (0 = none)
    #[arg(long, global = true, env = "AUTOEVAL_COMMAND_TIMEOUT")]
    command_timeout: Option<u64>,

    /// Treat this process as running inside the SDK chroot
    #[arg(long, global = true, env = "AUTOEVAL_INSIDE_CHROOT")]
    inside_chroot: Option<bool>,

    /// SSH private key used to reach the DUT
    #[arg(long, global = true, env = "AUTOEVAL_IDENTITY_FILE")]
    identity_file: Option<PathBuf>,
}

impl EvaluatorArgs {
    /// Merge the config file (if any) under the flag values.
    fn options(&self) -> Result<EvaluatorOptions> {
        let file = match &self.config {
            Some(path) => EvaluatorOptions::from_json_file(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => EvaluatorOptions::default(),
        };
        let flags = EvaluatorOptions {
            base_dir: self.base_dir.clone(),
            board: self.board.clone(),
            test_name: self.test_name.clone(),
            metric: self.metric.clone(),
            metric_take_average: self.metric_take_average,
            reuse_eval: self.reuse_eval,
            chromium_dir: self.chromium_dir.clone(),
            cros_dir: self.cros_dir.clone(),
            command_timeout_secs: self.command_timeout,
            inside_chroot: self.inside_chroot,
            identity_file: self.identity_file.clone(),
        };
        let mut options = file.merged_with(flags);
        if options.inside_chroot.is_none() {
            options.inside_chroot = Some(detect_inside_chroot());
        }
        Ok(options)
    }

    fn evaluator(&self) -> Result<AutotestEvaluator> {
        AutotestEvaluator::from_options(self.options()?, Arc::new(ProcessRunner))
            .context("Failed to configure evaluator")
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark on a DUT and print the score
    Evaluate {
        /// DUT address: host, host:port, user@host or ssh://...
        #[arg(short, long)]
        device: String,

        /// Build label the reports are stored under
        #[arg(short, long)]
        label: String,

        /// Number of runs
        #[arg(short, long, default_value = "1")]
        repeat: usize,

        /// Also write the summary JSON here
        #[arg(long)]
        summary_out: Option<PathBuf>,
    },

    /// Score a previous evaluation from stored reports
    CheckLast {
        #[arg(short, long)]
        label: String,

        #[arg(short, long, default_value = "1")]
        repeat: usize,
    },

    /// Run the test once directly on the DUT
    RunDevice {
        #[arg(short, long)]
        device: String,

        /// Where to copy the report
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run the test once from the host via test_that
    RunHost {
        #[arg(short, long)]
        device: String,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the configured metric from a report file
    Extract {
        #[arg(short, long)]
        report: PathBuf,
    },

    /// Set up the ChromiumOS checkout and board if needed
    SetupBoard,

    /// Write the unknown-critical-extension certificate chain fixture
    GenChain {
        /// Output directory for chain.pem
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
}

/// Score of one evaluation, as printed on stdout.
#[derive(Debug, Serialize)]
struct EvaluationSummary {
    label: String,
    repeat: usize,
    board: String,
    test_name: String,
    metric: String,
    reused: bool,
    score: Score,
    timestamp: DateTime<Utc>,
}

impl EvaluationSummary {
    fn new(evaluator: &AutotestEvaluator, label: &str, repeat: usize, reused: bool, score: Score) -> Self {
        let config = evaluator.config();
        Self {
            label: label.to_string(),
            repeat,
            board: config.board.clone(),
            test_name: config.test_name.clone(),
            metric: config.metric.clone(),
            reused,
            score,
            timestamp: Utc::now(),
        }
    }

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    autoeval_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Evaluate {
            device,
            label,
            repeat,
            summary_out,
        } => {
            let evaluator = cli.evaluator.evaluator()?;
            let summary = cmd_evaluate(&evaluator, &device, &label, repeat).await?;
            emit_summary(&summary, summary_out.as_deref())
        }
        Commands::CheckLast { label, repeat } => {
            let evaluator = cli.evaluator.evaluator()?;
            let summary = cmd_check_last(&evaluator, &label, repeat);
            emit_summary(&summary, None)
        }
        Commands::RunDevice { device, output } => {
            let evaluator = cli.evaluator.evaluator()?;
            cmd_run_device(&evaluator, &device, &output).await
        }
        Commands::RunHost { device, output } => {
            let evaluator = cli.evaluator.evaluator()?;
            cmd_run_host(&evaluator, &device, &output).await
        }
        Commands::Extract { report } => {
            let value = cmd_extract(&cli.evaluator.options()?, &report)?;
            println!("{}", value);
            Ok(())
        }
        Commands::SetupBoard => {
            let evaluator = cli.evaluator.evaluator()?;
            cmd_setup_board(&evaluator).await
        }
        Commands::GenChain { out_dir } => cmd_gen_chain(&out_dir),
    }
}

fn emit_summary(summary: &EvaluationSummary, out: Option<&Path>) -> Result<()> {
    let json = summary.to_json()?;
    if let Some(path) = out {
        std::fs::write(path, &json)
            .with_context(|| format!("Failed to write summary to {:?}", path))?;
        info!(path = %path.display(), "wrote summary");
    }
    println!("{}", json);
    Ok(())
}

/// Evaluate `label`, reusing stored reports when the evaluator allows it.
async fn cmd_evaluate(
    evaluator: &AutotestEvaluator,
    device: &str,
    label: &str,
    repeat: usize,
) -> Result<EvaluationSummary> {
    let device = Device::parse(device)?;

    let previous = evaluator.check_last_evaluate(label, repeat);
    if !previous.is_empty() {
        info!(label, score = %previous, "reusing previous evaluation");
        return Ok(EvaluationSummary::new(evaluator, label, repeat, true, previous));
    }

    let score = evaluator
        .evaluate(&device, label, repeat)
        .await
        .with_context(|| format!("Evaluation of '{}' on {} failed", label, device))?;
    Ok(EvaluationSummary::new(evaluator, label, repeat, false, score))
}

fn cmd_check_last(evaluator: &AutotestEvaluator, label: &str, repeat: usize) -> EvaluationSummary {
    let score = evaluator.check_last_evaluate(label, repeat);
    let reused = !score.is_empty();
    if !reused {
        info!(label, repeat, "no reusable evaluation found");
    }
    EvaluationSummary::new(evaluator, label, repeat, reused, score)
}

async fn cmd_run_device(evaluator: &AutotestEvaluator, device: &str, output: &Path) -> Result<()> {
    let device = Device::parse(device)?;
    if !evaluator.run_test_from_dut(&device, output).await {
        bail!("Test run on {} failed", device);
    }
    println!("Report copied to {:?}", output);
    Ok(())
}

async fn cmd_run_host(evaluator: &AutotestEvaluator, device: &str, output: &Path) -> Result<()> {
    let device = Device::parse(device)?;
    if !evaluator.run_test_from_host(&device, output).await {
        bail!("test_that run against {} failed", device);
    }
    println!("Report copied to {:?}", output);
    Ok(())
}

/// Only the metric options are needed here, not a full evaluator config.
fn cmd_extract(options: &EvaluatorOptions, report: &Path) -> Result<f64> {
    let metric = options
        .metric
        .as_deref()
        .context("--metric is required to extract a value")?;
    let take_average = options.metric_take_average.unwrap_or(false);
    read_metric(report, metric, take_average)
        .with_context(|| format!("Failed to extract '{}' from {:?}", metric, report))
}

async fn cmd_setup_board(evaluator: &AutotestEvaluator) -> Result<()> {
    let board = &evaluator.config().board;
    if !evaluator.may_setup_board().await {
        bail!("Setting up board '{}' failed", board);
    }
    println!("Board '{}' is ready", board);
    Ok(())
}

fn cmd_gen_chain(out_dir: &Path) -> Result<()> {
    let path = autoeval_certs::generate_unknown_critical_extension(out_dir)
        .with_context(|| format!("Failed to generate certificate chain in {:?}", out_dir))?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoeval_core::fakes::{FakeRemote, ScriptedRunner};
    use autoeval_core::{EvaluatorConfig, FindCommand};
    use clap::CommandFactory;

    const REMOTE_REPORT: &str =
        "/usr/local/autotest/results/default/graphics_WebGLAquarium/results/results-chart.json";

    fn report(value: f64) -> String {
        format!(r#"{{"avg_fps_1000_fishes": {{"summary": {{"value": {value}}}}}}}"#)
    }

    fn base_options(dir: &Path) -> EvaluatorOptions {
        EvaluatorOptions {
            base_dir: Some(dir.to_path_buf()),
            board: Some("samus".to_string()),
            test_name: Some("graphics_WebGLAquarium".to_string()),
            metric: Some("avg_fps_1000_fishes/summary/value".to_string()),
            metric_take_average: Some(false),
            reuse_eval: Some(true),
            inside_chroot: Some(false),
            ..Default::default()
        }
    }

    fn fake_evaluator(dir: &Path) -> (Arc<FakeRemote>, AutotestEvaluator) {
        let config = EvaluatorConfig::from_options(base_options(dir)).unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let remote = Arc::new(FakeRemote::new());
        let evaluator = AutotestEvaluator::with_collaborators(
            config,
            runner.clone(),
            remote.clone(),
            Arc::new(FindCommand::new(runner)),
        )
        .unwrap();
        (remote, evaluator)
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_evaluate_with_global_options() {
        let cli = Cli::try_parse_from([
            "autoeval",
            "--board",
            "samus",
            "evaluate",
            "--device",
            "192.168.1.1",
            "--label",
            "base",
            "--repeat",
            "3",
            "--reuse-eval",
            "false",
        ])
        .unwrap();
        assert_eq!(cli.evaluator.board.as_deref(), Some("samus"));
        assert_eq!(cli.evaluator.reuse_eval, Some(false));
        match cli.command {
            Commands::Evaluate { label, repeat, .. } => {
                assert_eq!(label, "base");
                assert_eq!(repeat, 3);
            }
            _ => panic!("expected evaluate"),
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("autoeval.json");
        std::fs::write(
            &config,
            r#"{"board": "eve", "test_name": "graphics_WebGLAquarium", "inside_chroot": false}"#,
        )
        .unwrap();

        let args = EvaluatorArgs {
            config: Some(config),
            board: Some("samus".to_string()),
            ..Default::default()
        };
        let options = args.options().unwrap();
        assert_eq!(options.board.as_deref(), Some("samus"));
        assert_eq!(options.test_name.as_deref(), Some("graphics_WebGLAquarium"));
        assert_eq!(options.inside_chroot, Some(false));
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let args = EvaluatorArgs {
            config: Some(PathBuf::from("/nonexistent/autoeval.json")),
            ..Default::default()
        };
        assert!(args.options().is_err());
    }

    #[test]
    fn test_evaluator_requires_options() {
        let err = EvaluatorArgs::default().evaluator().err().expect("expected error");
        assert!(format!("{:#}", err).contains("Missing command line arguments"));
    }

    #[test]
    fn test_extract() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results-chart.json");
        std::fs::write(&path, report(56.73)).unwrap();

        let value = cmd_extract(&base_options(dir.path()), &path).unwrap();
        assert_eq!(value, 56.73);

        let no_metric = EvaluatorOptions::default();
        assert!(cmd_extract(&no_metric, &path).is_err());
    }

    #[tokio::test]
    async fn test_evaluate_reuses_stored_reports() {
        let dir = tempfile::tempdir().unwrap();
        let (remote, evaluator) = fake_evaluator(dir.path());
        for (i, v) in [56.0, 58.0].iter().enumerate() {
            let path = evaluator.report_path("base", i + 1, 2);
            std::fs::write(path, report(*v)).unwrap();
        }

        let summary = cmd_evaluate(&evaluator, "192.168.1.1", "base", 2).await.unwrap();
        assert!(summary.reused);
        assert_eq!(summary.score.values, vec![56.0, 58.0]);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_runs_when_nothing_stored() {
        let dir = tempfile::tempdir().unwrap();
        let (remote, evaluator) = fake_evaluator(dir.path());
        remote.on_sh(
            &[
                "/usr/local/autotest/bin/autotest_client",
                "/usr/local/autotest/tests/graphics_WebGLAquarium/control",
            ],
            0,
        );
        remote.push_scp(REMOTE_REPORT, 0, Some(&report(61.5)));

        let summary = cmd_evaluate(&evaluator, "192.168.1.1", "r1", 1).await.unwrap();
        assert!(!summary.reused);
        assert_eq!(summary.score.values, vec![61.5]);

        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["label"], "r1");
        assert_eq!(json["score"]["mean"], 61.5);
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn test_evaluate_rejects_bad_device() {
        let dir = tempfile::tempdir().unwrap();
        let (_, evaluator) = fake_evaluator(dir.path());
        assert!(cmd_evaluate(&evaluator, "", "base", 1).await.is_err());
    }

    #[test]
    fn test_check_last_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (_, evaluator) = fake_evaluator(dir.path());
        let summary = cmd_check_last(&evaluator, "base", 2);
        assert!(summary.score.is_empty());
        assert!(!summary.reused);
    }

    #[test]
    fn test_check_last_found() {
        let dir = tempfile::tempdir().unwrap();
        let (_, evaluator) = fake_evaluator(dir.path());
        std::fs::write(evaluator.report_path("base", 1, 1), report(60.0)).unwrap();

        let summary = cmd_check_last(&evaluator, "base", 1);
        assert!(summary.reused);
        assert_eq!(summary.score.values, vec![60.0]);
    }

    #[test]
    fn test_identity_file_flag() {
        let cli = Cli::try_parse_from([
            "autoeval",
            "--identity-file",
            "/keys/testing_rsa",
            "--inside-chroot",
            "false",
            "setup-board",
        ])
        .unwrap();
        let options = cli.evaluator.options().unwrap();
        assert_eq!(options.identity_file, Some(PathBuf::from("/keys/testing_rsa")));
    }

    #[test]
    fn test_gen_chain() {
        let dir = tempfile::tempdir().unwrap();
        cmd_gen_chain(dir.path()).unwrap();
        let ders = autoeval_certs::read_chain(&dir.path().join("chain.pem")).unwrap();
        assert_eq!(ders.len(), 3);
    }
}
