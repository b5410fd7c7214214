//! Worker process supervision.
//!
//! Each registered volume owns one worker process. The supervisor starts
//! workers, forwards their output to the log, polls them for exit, and stops
//! them on request. Workers are never restarted.

mod errors;
mod launcher;
mod output;
mod worker;

pub use self::errors::SpawnError;
pub(crate) use self::launcher::{ProcessLauncher, WorkerLauncher};
pub(crate) use self::worker::{ChildWorker, Worker};
pub use self::worker::WorkerExit;

pub(crate) const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervisor");
