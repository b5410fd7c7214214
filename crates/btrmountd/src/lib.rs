//! Control-plane service for btrfs volume mounts.
//!
//! `btrmountd` listens on a local control socket configured through
//! [`btrmount_config`], and answers one request per connection using the
//! text protocol from [`btrmount_protocol`]. Clients ask it to mount a volume,
//! which starts a dedicated worker process, or to list the volumes it knows
//! about. Workers call back over the same socket to fetch their options and to
//! report the filesystem they mounted.
//!
//! Requests are served strictly one at a time on a single listener thread.
//! The volume registry records one entry per live worker; workers that exit
//! are reaped before the next request is dispatched, and every remaining
//! worker is stopped when the service shuts down.
//!
//! Health reporting hooks emit structured telemetry at each lifecycle stage
//! so operators can follow bootstrap, worker launches, and shutdown.

mod bootstrap;
mod dispatch;
mod health;
mod process;
mod registry;
mod supervisor;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon};
pub use supervisor::{SpawnError, WorkerExit};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{HandlerFault, ListenerError};
#[cfg(unix)]
pub use transport::StaleSocketError;

#[cfg(test)]
mod tests;
