//! Board environment setup for host-side test runs.

use crate::command::CommandSpec;
use crate::evaluator::AutotestEvaluator;
use std::path::PathBuf;
use tracing::{error, info};

pub const MANIFEST_URL: &str = "https://chromium.googlesource.com/chromiumos/manifest.git";
pub const REPO_URL: &str = "https://chromium.googlesource.com/external/repo.git";

impl AutotestEvaluator {
    /// `/build/<board>` as seen from this process; its presence means the
    /// board is already set up.
    pub fn board_path(&self) -> PathBuf {
        self.resolve_path_from_chroot(format!("/build/{}", self.config.board))
    }

    /// `repo init` and `repo sync` the ChromiumOS checkout in `cros_dir`.
    pub async fn setup_cros_repo(&self) -> bool {
        let cros_dir = &self.config.cros_dir;
        info!(dir = %cros_dir.display(), "syncing ChromiumOS checkout");
        let init = CommandSpec::new([
            "repo",
            "init",
            "-u",
            MANIFEST_URL,
            "--repo-url",
            REPO_URL,
        ])
        .cwd(cros_dir);
        if !self.run_checked(&init).await {
            return false;
        }
        let sync = CommandSpec::new(["repo", "sync", "-j8"]).cwd(cros_dir);
        self.run_checked(&sync).await
    }

    /// Set up the board unless it already is.
    ///
    /// Syncs the checkout, then runs `setup_board` and `build_packages`
    /// inside the chroot. False if any step fails.
    pub async fn may_setup_board(&self) -> bool {
        let board_path = self.board_path();
        if board_path.is_dir() {
            info!(board = %self.config.board, "board already set up");
            return true;
        }

        info!(board = %self.config.board, path = %board_path.display(), "setting up board");
        if let Err(e) = tokio::fs::create_dir_all(&self.config.cros_dir).await {
            error!(dir = %self.config.cros_dir.display(), error = %e, "failed to create cros dir");
            return false;
        }
        if !self.setup_cros_repo().await {
            return false;
        }

        let board = self.config.board.as_str();
        for step in ["./setup_board", "./build_packages"] {
            let spec = self.chroot_command([step, "--board", board]);
            if !self.run_checked(&spec).await {
                error!(board, step, "board setup step failed");
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::command::CommandOutput;
    use crate::config::{EvaluatorConfig, EvaluatorOptions};
    use crate::evaluator::AutotestEvaluator;
    use crate::fakes::ScriptedRunner;
    use std::path::Path;
    use std::sync::Arc;

    fn make(dir: &Path) -> (Arc<ScriptedRunner>, AutotestEvaluator) {
        let config = EvaluatorConfig::from_options(EvaluatorOptions {
            base_dir: Some(dir.to_path_buf()),
            board: Some("samus".to_string()),
            test_name: Some("graphics_WebGLAquarium".to_string()),
            metric: Some("avg_fps_1000_fishes/summary/value".to_string()),
            metric_take_average: Some(false),
            reuse_eval: Some(true),
            ..Default::default()
        })
        .unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let evaluator = AutotestEvaluator::new(config, runner.clone()).unwrap();
        (runner, evaluator)
    }

    #[tokio::test]
    async fn test_board_already_set_up() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, evaluator) = make(dir.path());
        std::fs::create_dir_all(dir.path().join("cros/chroot/build/samus")).unwrap();

        assert!(evaluator.may_setup_board().await);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_setup_cros_repo_commands() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, evaluator) = make(dir.path());
        runner.respond_when(|spec| spec.program() == "repo", CommandOutput::ok(""));

        assert!(evaluator.setup_cros_repo().await);
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].argv_is(&[
            "repo",
            "init",
            "-u",
            super::MANIFEST_URL,
            "--repo-url",
            super::REPO_URL
        ]));
        assert!(calls[1].argv_is(&["repo", "sync", "-j8"]));
        assert!(calls.iter().all(|c| c.cwd == Some(dir.path().join("cros"))));
    }

    #[tokio::test]
    async fn test_repo_init_failure_stops_sync() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, evaluator) = make(dir.path());
        runner.respond_when(|spec| spec.program() == "repo", CommandOutput::exit(1));

        assert!(!evaluator.setup_cros_repo().await);
        assert_eq!(runner.calls().len(), 1);
    }
}
