//! Structured health reporting for service lifecycle events.

use std::sync::Arc;

use btrmount_config::{Config, SocketEndpoint};
use btrmount_protocol::InstanceId;

use crate::bootstrap::BootstrapError;
use crate::supervisor::{SpawnError, WorkerExit};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the control socket accepts connections.
    fn listener_ready(&self, endpoint: &SocketEndpoint);

    /// Invoked after a worker process starts for a new volume.
    fn worker_started(&self, instance: InstanceId, pid: u32);

    /// Invoked when a worker process cannot be started.
    fn worker_failed(&self, error: &SpawnError);

    /// Invoked when a worker is found to have exited or has been stopped.
    fn worker_exited(&self, instance: InstanceId, exit: &WorkerExit);

    /// Invoked when a termination signal starts the shutdown sequence.
    fn shutdown_started(&self);

    /// Invoked after the listener stopped and every worker was stopped.
    fn shutdown_completed(&self, stopped_workers: usize);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn listener_ready(&self, endpoint: &SocketEndpoint) {
        (**self).listener_ready(endpoint);
    }

    fn worker_started(&self, instance: InstanceId, pid: u32) {
        (**self).worker_started(instance, pid);
    }

    fn worker_failed(&self, error: &SpawnError) {
        (**self).worker_failed(error);
    }

    fn worker_exited(&self, instance: InstanceId, exit: &WorkerExit) {
        (**self).worker_exited(instance, exit);
    }

    fn shutdown_started(&self) {
        (**self).shutdown_started();
    }

    fn shutdown_completed(&self, stopped_workers: usize) {
        (**self).shutdown_completed(stopped_workers);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting service bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            worker_binary = %config.worker_binary(),
            "service bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "service bootstrap failed"
        );
    }

    fn listener_ready(&self, endpoint: &SocketEndpoint) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_ready",
            endpoint = %endpoint,
            "control socket ready"
        );
    }

    fn worker_started(&self, instance: InstanceId, pid: u32) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "worker_started",
            %instance,
            pid,
            "worker started"
        );
    }

    fn worker_failed(&self, error: &SpawnError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "worker_failed",
            executable = error.executable(),
            error = %error,
            "worker failed to start"
        );
    }

    fn worker_exited(&self, instance: InstanceId, exit: &WorkerExit) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "worker_exited",
            %instance,
            exit = %exit,
            "worker exited"
        );
    }

    fn shutdown_started(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_started",
            "shutdown requested"
        );
    }

    fn shutdown_completed(&self, stopped_workers: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_completed",
            stopped_workers,
            "shutdown sequence completed"
        );
    }
}
