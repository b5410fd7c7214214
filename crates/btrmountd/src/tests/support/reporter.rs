//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::sync::Mutex;

use btrmount_config::{Config, SocketEndpoint};
use btrmount_protocol::InstanceId;

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;
use crate::supervisor::{SpawnError, WorkerExit};

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// The listener is accepting connections.
    ListenerReady,
    /// A worker started.
    WorkerStarted(InstanceId),
    /// A worker failed to start.
    WorkerFailed(String),
    /// A worker exited or was stopped.
    WorkerExited(InstanceId, WorkerExit),
    /// Shutdown began.
    ShutdownStarted,
    /// Shutdown finished after stopping the given number of workers.
    ShutdownCompleted(usize),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn listener_ready(&self, _endpoint: &SocketEndpoint) {
        self.record(HealthEvent::ListenerReady);
    }

    fn worker_started(&self, instance: InstanceId, _pid: u32) {
        self.record(HealthEvent::WorkerStarted(instance));
    }

    fn worker_failed(&self, error: &SpawnError) {
        self.record(HealthEvent::WorkerFailed(error.to_string()));
    }

    fn worker_exited(&self, instance: InstanceId, exit: &WorkerExit) {
        self.record(HealthEvent::WorkerExited(instance, *exit));
    }

    fn shutdown_started(&self) {
        self.record(HealthEvent::ShutdownStarted);
    }

    fn shutdown_completed(&self, stopped_workers: usize) {
        self.record(HealthEvent::ShutdownCompleted(stopped_workers));
    }
}
