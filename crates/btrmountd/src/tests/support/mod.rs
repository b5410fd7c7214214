//! Test harness utilities shared by the service's unit and behaviour suites.

mod config_loader;
mod launcher;
mod reporter;
mod worker;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use launcher::StubLauncher;
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use worker::{StubWorker, WorkerControl};
