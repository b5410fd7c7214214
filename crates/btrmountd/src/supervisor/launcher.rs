//! Launching worker processes.

use std::process::{Command, Stdio};

use tracing::info;

use btrmount_config::SocketEndpoint;
use btrmount_protocol::{InstanceId, MountOptions};

use super::output::capture;
use super::{ChildWorker, SUPERVISOR_TARGET, SpawnError, Worker};

/// Starts worker processes for newly registered volumes.
pub(crate) trait WorkerLauncher: Send + Sync {
    /// Starts a worker for `instance`.
    ///
    /// The worker is expected to fetch `options` back over the control socket.
    fn launch(
        &self,
        instance: InstanceId,
        options: &MountOptions,
    ) -> Result<Box<dyn Worker>, SpawnError>;
}

/// Launches the configured worker executable as a child process.
#[derive(Debug, Clone)]
pub(crate) struct ProcessLauncher {
    executable: String,
    control_socket: SocketEndpoint,
    parent_pid: u32,
}

impl ProcessLauncher {
    pub(crate) fn new(executable: impl Into<String>, control_socket: SocketEndpoint) -> Self {
        Self {
            executable: executable.into(),
            control_socket,
            parent_pid: std::process::id(),
        }
    }

    fn command(&self, instance: InstanceId) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg(format!("--instance-id={instance}"))
            .arg(format!("--daemon-socket={}", self.control_socket))
            .arg(format!("--parent-pid={}", self.parent_pid))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(
        &self,
        instance: InstanceId,
        options: &MountOptions,
    ) -> Result<Box<dyn Worker>, SpawnError> {
        let mut child = self
            .command(instance)
            .spawn()
            .map_err(|source| SpawnError::from_io(&self.executable, source))?;
        info!(
            target: SUPERVISOR_TARGET,
            %instance,
            pid = child.id(),
            mount_point = options.mount_point(),
            executable = %self.executable,
            "worker launched"
        );
        capture(instance, "stdout", child.stdout.take());
        capture(instance, "stderr", child.stderr.take());
        Ok(Box::new(ChildWorker::new(instance, child)))
    }
}
