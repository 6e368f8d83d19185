//! Autotest evaluator: run a benchmark on a DUT, collect its report, score it.
//!
//! A run first tries the DUT directly (`autotest_client` over SSH, then
//! `scp` of the chart file). If that fails it falls back to the host path:
//! `test_that` inside the ChromiumOS SDK chroot, with the chart file located
//! under the harness' latest results directory.
//!
//! Each run's report is kept in the report store as
//! `results-chart.<label>.<n>-<repeat>.json`, which is what
//! [`AutotestEvaluator::check_last_evaluate`] reuses later. Reports of an
//! evaluation are published together once every run has succeeded.

use crate::command::{CommandRunner, CommandSpec};
use crate::config::{EvaluatorConfig, EvaluatorOptions};
use crate::device::Device;
use crate::error::{EvalError, ReportError, Result};
use crate::finder::{normalize_path, FileFinder, FindCommand};
use crate::remote::{RemoteShell, SshRemote};
use crate::report::{read_metric, scan_reports, StoredReport, RESULT_FILENAME};
use crate::score::Score;
use crate::state::Evaluation;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Drives autotest runs for one board/test/metric combination.
pub struct AutotestEvaluator {
    pub(crate) config: EvaluatorConfig,
    pub(crate) runner: Arc<dyn CommandRunner>,
    remote: Arc<dyn RemoteShell>,
    finder: Arc<dyn FileFinder>,
}

impl AutotestEvaluator {
    /// Autotest install root on the DUT.
    pub const AUTOTEST_BASE: &'static str = "/usr/local/autotest";

    /// Client entry point on the DUT.
    pub const AUTOTEST_CLIENT: &'static str = "/usr/local/autotest/bin/autotest_client";

    /// Build an evaluator whose SSH and `find` collaborators run through `runner`.
    pub fn new(config: EvaluatorConfig, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let mut ssh = SshRemote::new(runner.clone()).with_timeout(config.command_timeout);
        if let Some(identity) = &config.identity_file {
            ssh = ssh.with_identity_file(identity);
        }
        let remote = Arc::new(ssh);
        let finder = Arc::new(FindCommand::new(runner.clone()));
        Self::with_collaborators(config, runner, remote, finder)
    }

    /// Validate `options` and build an evaluator.
    pub fn from_options(options: EvaluatorOptions, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let config = EvaluatorConfig::from_options(options)?;
        Self::new(config, runner)
    }

    /// Build an evaluator with explicit collaborators.
    ///
    /// Creates the report store directory.
    pub fn with_collaborators(
        config: EvaluatorConfig,
        runner: Arc<dyn CommandRunner>,
        remote: Arc<dyn RemoteShell>,
        finder: Arc<dyn FileFinder>,
    ) -> Result<Self> {
        std::fs::create_dir_all(config.report_base_dir())?;
        Ok(Self {
            config,
            runner,
            remote,
            finder,
        })
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn report_base_dir(&self) -> PathBuf {
        self.config.report_base_dir()
    }

    /// Control file of the test on the DUT.
    pub fn test_target(&self) -> String {
        format!("{}/tests/{}/control", Self::AUTOTEST_BASE, self.config.test_name)
    }

    /// Chart file autotest leaves on the DUT after a client run.
    pub fn remote_report_file(&self) -> String {
        format!(
            "{}/results/default/{}/results/{}",
            Self::AUTOTEST_BASE,
            self.config.test_name,
            RESULT_FILENAME
        )
    }

    /// Map a chroot path to where it lives from this process' point of view.
    pub fn resolve_path_from_chroot(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if self.config.inside_chroot {
            return path.to_path_buf();
        }
        let relative = path.strip_prefix("/").unwrap_or(path);
        self.config.cros_dir.join("chroot").join(relative)
    }

    /// Where `test_that` leaves results for this test.
    pub fn test_result_path(&self) -> PathBuf {
        self.resolve_path_from_chroot(format!(
            "/tmp/test_that_latest/results-1-{}",
            self.config.test_name
        ))
    }

    /// Stored report path for run `nth` of `repeat` under `label`.
    pub fn report_path(&self, label: &str, nth: usize, repeat: usize) -> PathBuf {
        StoredReport::path_in(&self.report_base_dir(), label, nth, repeat)
    }

    /// Wrap `argv` so it runs inside the SDK chroot, from `cros_dir`.
    pub fn chroot_command<I, S>(&self, argv: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        let full = if self.config.inside_chroot {
            argv
        } else {
            let mut wrapped = vec![
                "cros_sdk".to_string(),
                "--chrome_root".to_string(),
                self.config.chromium_dir.display().to_string(),
                "--no-ns-pid".to_string(),
                "--".to_string(),
            ];
            wrapped.extend(argv);
            wrapped
        };
        CommandSpec::new(full).cwd(&self.config.cros_dir)
    }

    /// Run `spec`; true only on a zero exit.
    pub(crate) async fn run_checked(&self, spec: &CommandSpec) -> bool {
        match self.runner.run(spec).await {
            Ok(output) if output.success() => true,
            Ok(output) => {
                error!(
                    argv = ?spec.argv,
                    exit_code = output.exit_code,
                    stderr = %output.stderr.trim(),
                    "command failed"
                );
                false
            }
            Err(e) => {
                error!(argv = ?spec.argv, error = %e, "command could not run");
                false
            }
        }
    }

    /// Run the test on the DUT and copy its report to `report_file`.
    pub async fn run_test_from_dut(&self, device: &Device, report_file: &Path) -> bool {
        let argv = vec![Self::AUTOTEST_CLIENT.to_string(), self.test_target()];
        info!(dut = %device, test = %self.config.test_name, "running autotest on DUT");
        match self.remote.remote_sh(device, &argv).await {
            Ok(out) if out.success() => {}
            Ok(out) => {
                error!(dut = %device, exit_code = out.exit_code, "autotest_client failed on DUT");
                return false;
            }
            Err(e) => {
                error!(dut = %device, error = %e, "failed to run autotest_client on DUT");
                return false;
            }
        }

        let remote_report = self.remote_report_file();
        match self.remote.scp_to_local(device, &remote_report, report_file).await {
            Ok(out) if out.success() => {
                debug!(from = %remote_report, to = %report_file.display(), "copied report");
                true
            }
            Ok(out) => {
                error!(exit_code = out.exit_code, remote = %remote_report, "failed to copy report from DUT");
                false
            }
            Err(e) => {
                error!(error = %e, remote = %remote_report, "failed to copy report from DUT");
                false
            }
        }
    }

    /// Find the chart file produced by the last `test_that` run.
    pub async fn lookup_report_file(&self) -> Option<PathBuf> {
        let results_dir = self.test_result_path();
        let found = match self.finder.find(&results_dir, RESULT_FILENAME).await {
            Ok(found) => found,
            Err(e) => {
                warn!(dir = %results_dir.display(), error = %e, "report search failed");
                return None;
            }
        };

        let first = found.first()?;
        if found.len() > 1 {
            warn!(
                count = found.len(),
                using = %first.display(),
                "more than one report file found"
            );
        }
        Some(normalize_path(&results_dir.join(first)))
    }

    /// Run the test from the host via `test_that` and copy its report to `report_file`.
    pub async fn run_test_from_host(&self, device: &Device, report_file: &Path) -> bool {
        if !self.may_setup_board().await {
            error!(board = %self.config.board, "board setup failed");
            return false;
        }

        info!(dut = %device, test = %self.config.test_name, "running test_that from host");
        let address = device.harness_address();
        let spec = self
            .chroot_command([
                "test_that",
                "-b",
                self.config.board.as_str(),
                "--fast",
                "--args",
                "local=True",
                address.as_str(),
                self.config.test_name.as_str(),
            ])
            .timeout(self.config.command_timeout);
        if !self.run_checked(&spec).await {
            return false;
        }

        let Some(found) = self.lookup_report_file().await else {
            error!(dir = %self.test_result_path().display(), "test_that left no report");
            return false;
        };
        match tokio::fs::copy(&found, report_file).await {
            Ok(_) => true,
            Err(e) => {
                error!(from = %found.display(), to = %report_file.display(), error = %e, "failed to copy report");
                false
            }
        }
    }

    /// Extract the configured metric from a report file.
    pub fn get_metric_value(&self, report_file: &Path) -> std::result::Result<f64, ReportError> {
        read_metric(
            report_file,
            &self.config.metric,
            self.config.metric_take_average,
        )
    }

    /// Run the test `repeat` times against `device` and score the results.
    ///
    /// Any failed run aborts the evaluation; no partial score is returned.
    pub async fn evaluate(&self, device: &Device, label: &str, repeat: usize) -> Result<Score> {
        let mut evaluation = Evaluation::new(label, repeat);
        self.evaluate_into(&mut evaluation, device).await
    }

    /// Like [`evaluate`](Self::evaluate), recording the lifecycle in `evaluation`.
    pub async fn evaluate_into(&self, evaluation: &mut Evaluation, device: &Device) -> Result<Score> {
        evaluation.start()?;
        info!(label = %evaluation.label, repeat = evaluation.repeat, "evaluation started");

        match self.run_repeats(device, &evaluation.label, evaluation.repeat).await {
            Ok(score) => {
                info!(label = %evaluation.label, %score, "evaluation succeeded");
                evaluation.succeed(score.clone())?;
                Ok(score)
            }
            Err(e) => {
                error!(label = %evaluation.label, error = %e, "evaluation failed");
                evaluation.fail(e.to_string())?;
                Err(e)
            }
        }
    }

    async fn run_repeats(&self, device: &Device, label: &str, repeat: usize) -> Result<Score> {
        if repeat == 0 {
            return Err(EvalError::ZeroRepeat);
        }

        let mut staged = Vec::with_capacity(repeat);
        let result = self.run_staged(device, label, repeat, &mut staged).await;
        match result {
            Ok(values) => {
                for (nth, partial) in staged.iter().enumerate() {
                    std::fs::rename(partial, self.report_path(label, nth + 1, repeat))?;
                }
                Ok(Score::new(values))
            }
            Err(e) => {
                for partial in &staged {
                    if let Err(rm) = std::fs::remove_file(partial) {
                        debug!(path = %partial.display(), error = %rm, "no partial report to remove");
                    }
                }
                Err(e)
            }
        }
    }

    /// Run every repeat into a `.partial` report; stored reports are only
    /// replaced once all runs have succeeded.
    async fn run_staged(
        &self,
        device: &Device,
        label: &str,
        repeat: usize,
        staged: &mut Vec<PathBuf>,
    ) -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(repeat);
        for nth in 1..=repeat {
            let report_file = partial_path(&self.report_path(label, nth, repeat));
            staged.push(report_file.clone());
            info!(run = nth, repeat, report = %report_file.display(), "starting run");

            let ran = if self.run_test_from_dut(device, &report_file).await {
                true
            } else {
                warn!(dut = %device, "DUT run failed, falling back to host");
                self.run_test_from_host(device, &report_file).await
            };
            if !ran {
                return Err(EvalError::RunFailed {
                    test_name: self.config.test_name.clone(),
                    nth,
                    repeat,
                });
            }

            values.push(self.get_metric_value(&report_file)?);
        }
        Ok(values)
    }

    /// Score up to `repeat` stored reports of `label` from the report store,
    /// without running anything.
    ///
    /// Reports are taken in run-index order, so a larger earlier evaluation
    /// can satisfy a smaller request. Empty when reuse is disabled, when
    /// fewer than `repeat` reports of `label` exist, or when one of the
    /// selected reports can't be read.
    pub fn check_last_evaluate(&self, label: &str, repeat: usize) -> Score {
        if !self.config.reuse_eval || repeat == 0 {
            return Score::empty();
        }

        let reports = match scan_reports(&self.report_base_dir()) {
            Ok(reports) => reports,
            Err(e) => {
                warn!(error = %e, "failed to scan report store");
                return Score::empty();
            }
        };

        let mut selected: Vec<StoredReport> =
            reports.into_iter().filter(|r| r.label == label).collect();
        if selected.len() < repeat {
            debug!(label, found = selected.len(), repeat, "not enough stored reports to reuse");
            return Score::empty();
        }
        selected.sort_by_key(|r| (r.index, r.repeat));
        selected.truncate(repeat);

        let mut values = Vec::with_capacity(repeat);
        for report in &selected {
            match self.get_metric_value(&report.path) {
                Ok(value) => values.push(value),
                Err(e) => {
                    warn!(report = %report.path.display(), error = %e, "stored report unusable");
                    return Score::empty();
                }
            }
        }
        let score = Score::new(values);
        info!(label, %score, "reusing previous evaluation");
        score
    }
}

/// `<report>.partial`; the stored-report scan never matches it.
fn partial_path(report: &Path) -> PathBuf {
    let mut name = report.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::fakes::{FakeRemote, ScriptedRunner};

    fn make_evaluator(dir: &Path, inside_chroot: bool) -> AutotestEvaluator {
        let config = EvaluatorConfig::from_options(EvaluatorOptions {
            base_dir: Some(dir.to_path_buf()),
            board: Some("samus".to_string()),
            test_name: Some("graphics_WebGLAquarium".to_string()),
            metric: Some("avg_fps_1000_fishes/summary/value".to_string()),
            metric_take_average: Some(false),
            reuse_eval: Some(true),
            inside_chroot: Some(inside_chroot),
            ..Default::default()
        })
        .unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        AutotestEvaluator::with_collaborators(
            config,
            runner.clone(),
            Arc::new(FakeRemote::new()),
            Arc::new(FindCommand::new(runner)),
        )
        .unwrap()
    }

    #[test]
    fn test_new_creates_report_dir() {
        let dir = tempfile::tempdir().unwrap();
        let evaluator = make_evaluator(dir.path(), false);
        assert_eq!(evaluator.report_base_dir(), dir.path().join("reports"));
        assert!(evaluator.report_base_dir().is_dir());
    }

    #[test]
    fn test_dut_paths() {
        let dir = tempfile::tempdir().unwrap();
        let evaluator = make_evaluator(dir.path(), false);
        assert_eq!(
            evaluator.test_target(),
            "/usr/local/autotest/tests/graphics_WebGLAquarium/control"
        );
        assert_eq!(
            evaluator.remote_report_file(),
            "/usr/local/autotest/results/default/graphics_WebGLAquarium/results/results-chart.json"
        );
    }

    #[test]
    fn test_resolve_path_from_chroot() {
        let dir = tempfile::tempdir().unwrap();
        let outside = make_evaluator(dir.path(), false);
        assert_eq!(
            outside.resolve_path_from_chroot("/build/samus"),
            dir.path().join("cros/chroot/build/samus")
        );
        let inside = make_evaluator(dir.path(), true);
        assert_eq!(
            inside.resolve_path_from_chroot("/build/samus"),
            PathBuf::from("/build/samus")
        );
    }

    #[test]
    fn test_chroot_command_wrapping() {
        let dir = tempfile::tempdir().unwrap();
        let outside = make_evaluator(dir.path(), false);
        let spec = outside.chroot_command(["./setup_board", "--board", "samus"]);
        let chromium = dir.path().join("chromium").display().to_string();
        assert!(spec.argv_is(&[
            "cros_sdk",
            "--chrome_root",
            chromium.as_str(),
            "--no-ns-pid",
            "--",
            "./setup_board",
            "--board",
            "samus"
        ]));
        assert_eq!(spec.cwd, Some(dir.path().join("cros")));

        let inside = make_evaluator(dir.path(), true);
        let spec = inside.chroot_command(["./setup_board", "--board", "samus"]);
        assert!(spec.argv_is(&["./setup_board", "--board", "samus"]));
    }

    #[test]
    fn test_report_path_naming() {
        let dir = tempfile::tempdir().unwrap();
        let evaluator = make_evaluator(dir.path(), false);
        assert_eq!(
            evaluator.report_path("base", 2, 3),
            dir.path().join("reports/results-chart.base.2-3.json")
        );
    }

    #[tokio::test]
    async fn test_zero_repeat_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let evaluator = make_evaluator(dir.path(), false);
        let dut = Device::parse("192.168.1.1").unwrap();
        let mut evaluation = Evaluation::new("base", 0);
        let err = evaluator.evaluate_into(&mut evaluation, &dut).await.unwrap_err();
        assert!(matches!(err, EvalError::ZeroRepeat));
        assert!(evaluation.state.is_terminal());
    }

    #[tokio::test]
    async fn test_identity_file_reaches_ssh() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvaluatorConfig::from_options(EvaluatorOptions {
            base_dir: Some(dir.path().to_path_buf()),
            board: Some("samus".to_string()),
            test_name: Some("graphics_WebGLAquarium".to_string()),
            metric: Some("avg_fps_1000_fishes/summary/value".to_string()),
            metric_take_average: Some(false),
            reuse_eval: Some(true),
            identity_file: Some(PathBuf::from("/keys/testing_rsa")),
            ..Default::default()
        })
        .unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond_when(|spec| spec.program() == "ssh", CommandOutput::exit(1));
        let evaluator = AutotestEvaluator::new(config, runner.clone()).unwrap();

        let dut = Device::parse("192.168.1.1").unwrap();
        assert!(!evaluator.run_test_from_dut(&dut, &dir.path().join("r.json")).await);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0]
            .argv
            .windows(2)
            .any(|w| w[0] == "-i" && w[1] == "/keys/testing_rsa"));
    }

    #[test]
    fn test_check_last_evaluate_zero_repeat() {
        let dir = tempfile::tempdir().unwrap();
        let evaluator = make_evaluator(dir.path(), false);
        assert!(evaluator.check_last_evaluate("base", 0).is_empty());
    }
}
