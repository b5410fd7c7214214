//! Handles to running worker processes.

use std::fmt;
use std::io;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use btrmount_protocol::InstanceId;

use super::SUPERVISOR_TARGET;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The worker exited with a status code.
    Code(i32),
    /// The worker was terminated by a signal.
    Signal(i32),
    /// The platform reported neither a code nor a signal.
    Unknown,
}

impl From<ExitStatus> for WorkerExit {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signal(signal);
            }
        }
        Self::Unknown
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(formatter, "exit code {code}"),
            Self::Signal(signal) => write!(formatter, "signal {signal}"),
            Self::Unknown => formatter.write_str("unknown status"),
        }
    }
}

/// A running worker owned by one registry entry.
pub(crate) trait Worker: Send + fmt::Debug {
    /// Operating system process identifier.
    fn pid(&self) -> u32;

    /// Returns the exit status if the worker has already ended.
    fn try_exit(&mut self) -> io::Result<Option<WorkerExit>>;

    /// Asks the worker to terminate, forcing it after `grace` elapses.
    fn stop(&mut self, grace: Duration) -> io::Result<WorkerExit>;
}

/// Worker backed by a [`std::process::Child`].
#[derive(Debug)]
pub(crate) struct ChildWorker {
    instance: InstanceId,
    child: Child,
}

impl ChildWorker {
    pub(crate) const fn new(instance: InstanceId, child: Child) -> Self {
        Self { instance, child }
    }

    #[cfg(unix)]
    fn request_termination(&self) {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(self.child.id()) else {
            return;
        };
        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(error) => warn!(
                target: SUPERVISOR_TARGET,
                instance = %self.instance,
                %error,
                "failed to signal worker"
            ),
        }
    }

    #[cfg(not(unix))]
    fn request_termination(&self) {}
}

impl Worker for ChildWorker {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn try_exit(&mut self) -> io::Result<Option<WorkerExit>> {
        Ok(self.child.try_wait()?.map(WorkerExit::from))
    }

    fn stop(&mut self, grace: Duration) -> io::Result<WorkerExit> {
        if let Some(exit) = self.try_exit()? {
            return Ok(exit);
        }
        self.request_termination();
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if let Some(exit) = self.try_exit()? {
                return Ok(exit);
            }
            thread::sleep(STOP_POLL_INTERVAL);
        }
        debug!(
            target: SUPERVISOR_TARGET,
            instance = %self.instance,
            grace_ms = grace.as_millis(),
            "worker ignored termination request; killing"
        );
        match self.child.kill() {
            Ok(()) => {}
            // Exited between the last poll and the kill.
            Err(error) if error.kind() == io::ErrorKind::InvalidInput => {}
            Err(error) => return Err(error),
        }
        Ok(self.child.wait()?.into())
    }
}
