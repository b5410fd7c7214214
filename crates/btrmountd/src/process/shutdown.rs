use std::io;
use std::sync::Mutex;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until shutdown should proceed.
    fn wait(&self) -> Result<(), ShutdownError>;

    /// Returns a callback that releases [`ShutdownSignal::wait`] from another
    /// thread, used when the service must stop without an external signal.
    fn trigger(&self) -> Box<dyn FnOnce() + Send>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The signal iterator could not be locked.
    #[error("shutdown signal state poisoned")]
    Poisoned,
}

/// Shutdown listener that waits for termination signals.
///
/// Handlers are installed on construction so that signals arriving during
/// start-up are not lost.
pub struct SystemShutdownSignal {
    signals: Mutex<Signals>,
    handle: Handle,
}

impl SystemShutdownSignal {
    /// Installs handlers for `SIGTERM`, `SIGINT`, `SIGQUIT` and `SIGHUP`.
    pub fn install() -> Result<Self, ShutdownError> {
        let signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        let handle = signals.handle();
        Ok(Self {
            signals: Mutex::new(signals),
            handle,
        })
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = self.signals.lock().map_err(|_| ShutdownError::Poisoned)?;
        match signals.forever().next() {
            Some(signal) => info!(
                target: PROCESS_TARGET,
                signal,
                "shutdown signal received"
            ),
            None => info!(target: PROCESS_TARGET, "shutdown triggered internally"),
        }
        Ok(())
    }

    fn trigger(&self) -> Box<dyn FnOnce() + Send> {
        let handle = self.handle.clone();
        Box::new(move || handle.close())
    }
}
