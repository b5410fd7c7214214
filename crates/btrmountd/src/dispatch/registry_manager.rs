//! Shared ownership of the volume registry.
//!
//! The listener thread dispatches against the registry while the main thread
//! tears it down at shutdown. This module encapsulates the locking and its
//! poisoning policy.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{info, warn};

use crate::registry::VolumeRegistry;
use crate::supervisor::Worker;

use super::errors::DispatchError;
use super::router::DISPATCH_TARGET;

/// Manager providing access to the shared registry with encapsulated locking.
#[derive(Clone, Debug)]
pub(crate) struct RegistryManager {
    inner: Arc<Mutex<VolumeRegistry>>,
}

impl RegistryManager {
    pub(crate) fn new(registry: VolumeRegistry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    /// Executes a closure with mutable access to the registry.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Internal` if the registry lock is poisoned.
    pub(crate) fn with_registry<F, R>(&self, f: F) -> Result<R, DispatchError>
    where
        F: FnOnce(&mut VolumeRegistry) -> R,
    {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| DispatchError::internal("registry lock poisoned"))?;
        Ok(f(&mut guard))
    }

    /// Stops every registered worker and empties the registry.
    ///
    /// Runs during shutdown, so a poisoned lock is recovered rather than
    /// reported. Returns the number of workers stopped.
    pub(crate) fn stop_all(&self, grace: Duration) -> usize {
        let entries = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain();
        let count = entries.len();
        for mut entry in entries {
            let instance = entry.instance();
            match entry.worker_mut().stop(grace) {
                Ok(exit) => info!(
                    target: DISPATCH_TARGET,
                    %instance,
                    %exit,
                    "worker stopped"
                ),
                Err(error) => warn!(
                    target: DISPATCH_TARGET,
                    %instance,
                    %error,
                    "failed to stop worker"
                ),
            }
        }
        count
    }
}
