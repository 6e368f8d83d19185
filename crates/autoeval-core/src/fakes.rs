//! Scripted collaborator fakes (testing only)
//!
//! Provides `ScriptedRunner` and `FakeRemote`, which satisfy the
//! [`CommandRunner`] and [`RemoteShell`] contracts without touching
//! processes or the network.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::device::Device;
use crate::error::CommandError;
use crate::remote::RemoteShell;

type Matcher = Box<dyn Fn(&CommandSpec) -> bool + Send + Sync>;
type Responder = Box<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

/// Command runner answering from a list of rules.
///
/// Rules are tried in insertion order; the first match answers. Commands that
/// match no rule fail with [`CommandError::Unexpected`]. Every call is
/// recorded, matched or not.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<(Matcher, Responder)>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands whose argv is exactly `argv`.
    pub fn respond(&self, argv: &[&str], output: CommandOutput) {
        let expected: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
        self.respond_when(move |spec| spec.argv == expected, output);
    }

    /// Answer commands accepted by `matcher` with a fixed output.
    pub fn respond_when<M>(&self, matcher: M, output: CommandOutput)
    where
        M: Fn(&CommandSpec) -> bool + Send + Sync + 'static,
    {
        self.respond_with(matcher, move |_| output.clone());
    }

    /// Answer commands accepted by `matcher` by calling `responder`.
    pub fn respond_with<M, R>(&self, matcher: M, responder: R)
    where
        M: Fn(&CommandSpec) -> bool + Send + Sync + 'static,
        R: Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    {
        self.rules
            .lock()
            .unwrap()
            .push((Box::new(matcher), Box::new(responder)));
    }

    /// Every command seen so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether some recorded call had exactly this argv.
    pub fn was_called(&self, argv: &[&str]) -> bool {
        self.calls.lock().unwrap().iter().any(|c| c.argv_is(argv))
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(spec.clone());
        let rules = self.rules.lock().unwrap();
        rules
            .iter()
            .find(|(matcher, _)| matcher(spec))
            .map(|(_, responder)| responder(spec))
            .ok_or_else(|| CommandError::Unexpected(spec.argv.join(" ")))
    }
}

// ---------------------------------------------------------------------------
// FakeRemote
// ---------------------------------------------------------------------------

/// A call observed by [`FakeRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Sh(Vec<String>),
    Scp { remote: String, local: PathBuf },
}

struct ScpResponse {
    remote: String,
    exit_code: i32,
    content: Option<String>,
}

/// In-memory DUT.
///
/// `remote_sh` answers from persistent argv rules. `scp_to_local` consumes
/// queued responses in order; a successful response with content writes that
/// content to the requested local path, as a real copy would.
#[derive(Default)]
pub struct FakeRemote {
    sh_rules: Mutex<Vec<(Vec<String>, i32)>>,
    scp_queue: Mutex<VecDeque<ScpResponse>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_sh(&self, argv: &[&str], exit_code: i32) {
        self.sh_rules
            .lock()
            .unwrap()
            .push((argv.iter().map(|s| s.to_string()).collect(), exit_code));
    }

    /// Queue one scp answer for `remote`.
    pub fn push_scp(&self, remote: &str, exit_code: i32, content: Option<&str>) {
        self.scp_queue.lock().unwrap().push_back(ScpResponse {
            remote: remote.to_string(),
            exit_code,
            content: content.map(str::to_string),
        });
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn scp_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, RemoteCall::Scp { .. }))
            .count()
    }
}

#[async_trait]
impl RemoteShell for FakeRemote {
    async fn remote_sh(&self, _device: &Device, argv: &[String]) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(RemoteCall::Sh(argv.to_vec()));
        let rules = self.sh_rules.lock().unwrap();
        rules
            .iter()
            .find(|(expected, _)| expected.as_slice() == argv)
            .map(|(_, code)| CommandOutput::exit(*code))
            .ok_or_else(|| CommandError::Unexpected(argv.join(" ")))
    }

    async fn scp_to_local(
        &self,
        _device: &Device,
        remote: &str,
        local: &Path,
    ) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(RemoteCall::Scp {
            remote: remote.to_string(),
            local: local.to_path_buf(),
        });

        let response = {
            let mut queue = self.scp_queue.lock().unwrap();
            match queue.front() {
                Some(next) if next.remote == remote => queue.pop_front(),
                _ => None,
            }
        };
        let response = response.ok_or_else(|| CommandError::Unexpected(format!("scp {remote}")))?;

        if response.exit_code == 0 {
            if let Some(content) = &response.content {
                std::fs::write(local, content).map_err(|source| CommandError::Spawn {
                    program: "scp".to_string(),
                    source,
                })?;
            }
        }
        Ok(CommandOutput::exit(response.exit_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_runner_first_match_wins() {
        let runner = ScriptedRunner::new();
        runner.respond(&["echo", "a"], CommandOutput::ok("first"));
        runner.respond_when(|_| true, CommandOutput::exit(3));

        let out = runner.run(&CommandSpec::new(["echo", "a"])).await.unwrap();
        assert_eq!(out.stdout, "first");
        let out = runner.run(&CommandSpec::new(["other"])).await.unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(runner.was_called(&["other"]));
    }

    #[tokio::test]
    async fn test_scripted_runner_unmatched_is_error() {
        let runner = ScriptedRunner::new();
        let err = runner.run(&CommandSpec::new(["nope"])).await.unwrap_err();
        assert!(matches!(err, CommandError::Unexpected(_)));
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_fake_remote_scp_writes_content_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let dut = Device::parse("10.0.0.1").unwrap();
        let remote = FakeRemote::new();
        remote.push_scp("/r.json", 0, Some("one"));
        remote.push_scp("/r.json", 0, Some("two"));

        let first = dir.path().join("1.json");
        let second = dir.path().join("2.json");
        assert!(remote.scp_to_local(&dut, "/r.json", &first).await.unwrap().success());
        assert!(remote.scp_to_local(&dut, "/r.json", &second).await.unwrap().success());
        assert_eq!(std::fs::read_to_string(first).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(second).unwrap(), "two");
        assert!(remote.scp_to_local(&dut, "/r.json", &dir.path().join("3")).await.is_err());
        assert_eq!(remote.scp_count(), 3);
    }
}
