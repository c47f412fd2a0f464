//! Command execution on this host or, through `kubectl exec`, inside a pod.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::errors::ExecError;
use crate::domain::ports::{CommandExecutor, ExecTarget};

/// Runs commands as child processes and returns their stdout.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    kubectl: String,
}

impl ProcessExecutor {
    pub fn new(kubectl: impl Into<String>) -> Self {
        Self {
            kubectl: kubectl.into(),
        }
    }

    fn command(&self, target: &ExecTarget, command: &str, args: &[&str]) -> Command {
        match target {
            ExecTarget::Local => {
                let mut cmd = Command::new(command);
                cmd.args(args);
                cmd
            }
            ExecTarget::Container {
                namespace,
                pod,
                container,
            } => {
                let mut cmd = Command::new(&self.kubectl);
                cmd.args(["exec", "-n", namespace, pod, "-c", container, "--", command])
                    .args(args);
                cmd
            }
        }
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn run(
        &self,
        target: &ExecTarget,
        command: &str,
        args: &[&str],
    ) -> Result<String, ExecError> {
        let cmdline = std::iter::once(command)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        debug!(%target, command = %cmdline, "Running command");

        let output = self
            .command(target, command, args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExecError::Launch {
                command: cmdline.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(%target, command = %cmdline, status = %output.status, stderr = %stderr, "Command failed");
            return Err(ExecError::Failed {
                command: cmdline,
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
