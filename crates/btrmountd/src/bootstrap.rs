//! Start-up checks run before the control socket is bound.
//!
//! Bootstrap resolves configuration, installs the log subscriber, makes sure
//! a worker program is configured, and creates the socket's parent directory.
//! Each stage either succeeds or ends bootstrap with a [`BootstrapError`];
//! the reporter hears about exactly one outcome.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use btrmount_config::{Config, SocketPreparationError};

use crate::health::HealthReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Source of the service configuration.
pub trait ConfigLoader: Send + Sync {
    /// Resolves the configuration from whatever layers the loader consults.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that reads CLI arguments, environment, and configuration files.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out a configuration resolved earlier.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Reasons the service could not start.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration layers could not be merged.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Loader diagnostic.
        #[source]
        source: Arc<OrthoError>,
    },
    /// The log subscriber could not be installed.
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    /// No worker program was configured, so no volume could ever be mounted.
    #[error("no worker binary is configured")]
    MissingWorkerBinary,
    /// The socket's parent directory could not be created.
    #[error("failed to prepare control socket: {0}")]
    Socket(#[from] SocketPreparationError),
}

/// Configuration and telemetry that survived bootstrap.
#[derive(Debug)]
pub struct Daemon {
    config: Config,
    telemetry: TelemetryHandle,
}

impl Daemon {
    /// Resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscriber serving this process.
    #[must_use]
    pub fn telemetry(&self) -> &TelemetryHandle {
        &self.telemetry
    }

    /// Consumes the daemon, yielding its configuration.
    #[must_use]
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Runs every start-up stage, reporting the outcome through `reporter`.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    match run_stages(loader) {
        Ok(daemon) => {
            reporter.bootstrap_succeeded(daemon.config());
            Ok(daemon)
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn run_stages(loader: &dyn ConfigLoader) -> Result<Daemon, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    let telemetry = telemetry::initialise(&config)?;
    if config.worker_binary().trim().is_empty() {
        return Err(BootstrapError::MissingWorkerBinary);
    }
    config.daemon_socket().prepare_filesystem()?;
    Ok(Daemon { config, telemetry })
}
