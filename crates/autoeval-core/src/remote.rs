//! Remote execution and copy on a DUT.

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::device::Device;
use crate::error::CommandError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Remote shell access to a device.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run `argv` on the device.
    async fn remote_sh(&self, device: &Device, argv: &[String]) -> Result<CommandOutput, CommandError>;

    /// Copy `remote` on the device to `local` on this host.
    async fn scp_to_local(
        &self,
        device: &Device,
        remote: &str,
        local: &Path,
    ) -> Result<CommandOutput, CommandError>;
}

/// [`RemoteShell`] over the system `ssh` and `scp` binaries.
pub struct SshRemote {
    runner: Arc<dyn CommandRunner>,
    identity_file: Option<PathBuf>,
    connect_timeout_secs: u64,
    timeout: Option<Duration>,
}

impl SshRemote {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            identity_file: None,
            connect_timeout_secs: 30,
            timeout: None,
        }
    }

    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn common_options(&self) -> Vec<String> {
        let mut opts: Vec<String> = [
            "-o",
            "BatchMode=yes",
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
            "-o",
            "LogLevel=ERROR",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        opts.push("-o".to_string());
        opts.push(format!("ConnectTimeout={}", self.connect_timeout_secs));
        if let Some(identity) = &self.identity_file {
            opts.push("-i".to_string());
            opts.push(identity.display().to_string());
        }
        opts
    }

    /// `ssh ... -p <port> user@host -- argv...`
    pub fn ssh_argv(&self, device: &Device, argv: &[String]) -> Vec<String> {
        let mut cmd = vec!["ssh".to_string()];
        cmd.extend(self.common_options());
        cmd.push("-p".to_string());
        cmd.push(device.port.to_string());
        cmd.push(device.login());
        cmd.push("--".to_string());
        cmd.extend(argv.iter().cloned());
        cmd
    }

    /// `scp ... -P <port> user@host:remote local`
    pub fn scp_argv(&self, device: &Device, remote: &str, local: &Path) -> Vec<String> {
        let mut cmd = vec!["scp".to_string()];
        cmd.extend(self.common_options());
        cmd.push("-P".to_string());
        cmd.push(device.port.to_string());
        cmd.push(device.scp_location(remote));
        cmd.push(local.display().to_string());
        cmd
    }
}

#[async_trait]
impl RemoteShell for SshRemote {
    async fn remote_sh(&self, device: &Device, argv: &[String]) -> Result<CommandOutput, CommandError> {
        let spec = CommandSpec::new(self.ssh_argv(device, argv)).timeout(self.timeout);
        self.runner.run(&spec).await
    }

    async fn scp_to_local(
        &self,
        device: &Device,
        remote: &str,
        local: &Path,
    ) -> Result<CommandOutput, CommandError> {
        let spec = CommandSpec::new(self.scp_argv(device, remote, local)).timeout(self.timeout);
        self.runner.run(&spec).await
    }
}
