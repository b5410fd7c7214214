//! Launcher double that hands out [`StubWorker`]s or fails on demand.

use std::io;
use std::sync::Mutex;

use btrmount_protocol::{InstanceId, MountOptions};

use crate::supervisor::{SpawnError, Worker, WorkerLauncher};

use super::{StubWorker, WorkerControl};

/// Records launches and answers them with a scripted outcome.
#[derive(Debug)]
pub struct StubLauncher {
    failure: Option<io::ErrorKind>,
    launched: Mutex<Vec<(InstanceId, WorkerControl)>>,
}

impl StubLauncher {
    /// Launcher whose every launch succeeds.
    #[must_use]
    pub fn succeeding() -> Self {
        Self {
            failure: None,
            launched: Mutex::new(Vec::new()),
        }
    }

    /// Launcher whose every launch fails with `kind`.
    #[must_use]
    pub fn failing(kind: io::ErrorKind) -> Self {
        Self {
            failure: Some(kind),
            launched: Mutex::new(Vec::new()),
        }
    }

    /// Instances launched so far, in order.
    #[must_use]
    pub fn launched(&self) -> Vec<InstanceId> {
        self.launched
            .lock()
            .expect("launcher mutex poisoned")
            .iter()
            .map(|(instance, _)| *instance)
            .collect()
    }

    /// Control for the worker launched as `instance`.
    #[must_use]
    pub fn control(&self, instance: InstanceId) -> Option<WorkerControl> {
        self.launched
            .lock()
            .expect("launcher mutex poisoned")
            .iter()
            .find(|(launched, _)| *launched == instance)
            .map(|(_, control)| control.clone())
    }
}

impl WorkerLauncher for StubLauncher {
    fn launch(
        &self,
        instance: InstanceId,
        _options: &MountOptions,
    ) -> Result<Box<dyn Worker>, SpawnError> {
        if let Some(kind) = self.failure {
            return Err(SpawnError::from_io("btrmount-worker", io::Error::from(kind)));
        }
        let control = WorkerControl::default();
        self.launched
            .lock()
            .expect("launcher mutex poisoned")
            .push((instance, control.clone()));
        Ok(Box::new(StubWorker::new(control)))
    }
}
