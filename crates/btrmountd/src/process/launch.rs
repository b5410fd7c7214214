//! Supervises service launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::info;

use btrmount_config::Config;

use crate::StructuredHealthReporter;
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::dispatch::{CommandDispatcher, DispatchConnectionHandler, RegistryManager};
use crate::health::HealthReporter;
use crate::registry::VolumeRegistry;
use crate::supervisor::{ProcessLauncher, WorkerLauncher};
use crate::transport::SocketListener;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Collaborators required to launch the service runtime.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) shutdown: S,
}

/// Runs the service using the production collaborators.
///
/// Returns once a termination signal has been handled, or with an error when
/// start-up fails or an internal fault stops the listener.
pub fn run_daemon() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: SystemShutdownSignal::install()?,
    };
    run_daemon_with(plan, |config: &Config| -> Arc<dyn WorkerLauncher> {
        Arc::new(ProcessLauncher::new(
            config.worker_binary(),
            config.daemon_socket().clone(),
        ))
    })
}

/// Runs the service with injected collaborators.
pub(crate) fn run_daemon_with<L, S, F>(
    plan: LaunchPlan<L, S>,
    make_launcher: F,
) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
    F: FnOnce(&Config) -> Arc<dyn WorkerLauncher>,
{
    let LaunchPlan {
        loader,
        reporter,
        shutdown,
    } = plan;

    let config = bootstrap_with(&loader, reporter.as_ref())?.into_config();
    info!(
        target: PROCESS_TARGET,
        socket = %config.daemon_socket(),
        "starting service runtime"
    );
    let listener = SocketListener::bind(config.daemon_socket())?;

    let registry = RegistryManager::new(VolumeRegistry::default());
    let dispatcher = CommandDispatcher::new(
        make_launcher(&config),
        Arc::clone(&reporter),
        config.worker_stop_timeout(),
    );
    let handler = Arc::new(DispatchConnectionHandler::new(
        Arc::new(dispatcher),
        registry.clone(),
        config.exchange_timeout(),
    ));

    let listener_handle = listener.start(handler, shutdown.trigger())?;
    reporter.listener_ready(config.daemon_socket());

    let waited = shutdown.wait();
    reporter.shutdown_started();
    listener_handle.shutdown();
    let joined = listener_handle.join();
    let stopped = registry.stop_all(config.worker_stop_timeout());
    reporter.shutdown_completed(stopped);

    waited?;
    joined?;
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}
