//! Process-wide `tracing` subscriber.
//!
//! Events always go to stderr. Listener and worker output threads are named
//! (`btrmountd-listener`, `worker-<instance>-stdout`), so the thread name is
//! recorded on every event to tell worker chatter apart from request handling.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;

use btrmount_config::{Config, LogFormat};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static INSTALLED: OnceCell<TelemetryHandle> = OnceCell::new();

/// Describes the subscriber that is serving this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryHandle {
    filter: String,
    format: LogFormat,
}

impl TelemetryHandle {
    /// Filter directives the subscriber was installed with.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Output format of the installed subscriber.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    fn matches(&self, config: &Config) -> bool {
        self.filter == config.log_filter() && self.format == config.log_format()
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter directives did not parse.
    #[error("invalid log filter '{directives}': {message}")]
    Filter {
        /// Directives as configured.
        directives: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another subscriber already owns the process.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(String),
}

/// Installs the global subscriber the first time it is called.
///
/// A subscriber can only be installed once per process, so later calls keep
/// the first configuration and return its handle.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let handle = INSTALLED.get_or_try_init(|| install(config))?;
    if !handle.matches(config) {
        debug!(
            target: TELEMETRY_TARGET,
            installed_filter = handle.filter(),
            requested_filter = config.log_filter(),
            installed_format = %handle.format(),
            requested_format = %config.log_format(),
            "telemetry already installed; keeping the first configuration"
        );
    }
    Ok(handle.clone())
}

fn install(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let directives = config.log_filter();
    let filter = EnvFilter::try_new(directives).map_err(|source| TelemetryError::Filter {
        directives: directives.to_owned(),
        message: source.to_string(),
    })?;

    let installed = match config.log_format() {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(io::stderr)
            .try_init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_ansi(io::stderr().is_terminal())
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(io::stderr)
            .try_init(),
    };
    installed.map_err(|source| TelemetryError::Subscriber(source.to_string()))?;

    let handle = TelemetryHandle {
        filter: directives.to_owned(),
        format: config.log_format(),
    };
    debug!(
        target: TELEMETRY_TARGET,
        filter = handle.filter(),
        format = %handle.format(),
        "telemetry installed"
    );
    Ok(handle)
}
