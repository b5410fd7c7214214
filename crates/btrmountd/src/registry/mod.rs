//! In-memory bookkeeping of mounted volumes.

mod entry;
mod ids;

use tracing::{info, warn};
use uuid::Uuid;

use btrmount_protocol::{InstanceId, MountOptions, VolumeRecord};

pub(crate) use self::entry::VolumeEntry;
pub(crate) use self::ids::{IdSource, RandomIds};
#[cfg(test)]
pub(crate) use self::ids::ScriptedIds;

use crate::supervisor::{SpawnError, Worker, WorkerExit};

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// A worker observed to have ended, along with the entry it served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReapedVolume {
    pub(crate) instance: InstanceId,
    pub(crate) mount_point: String,
    pub(crate) exit: WorkerExit,
}

/// Registry of live volume entries.
///
/// An entry exists only while its worker is known to be running. Instance
/// identifiers are unique among live entries.
pub(crate) struct VolumeRegistry {
    entries: Vec<VolumeEntry>,
    ids: Box<dyn IdSource>,
}

impl std::fmt::Debug for VolumeRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("VolumeRegistry")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl Default for VolumeRegistry {
    fn default() -> Self {
        Self::new(Box::new(RandomIds))
    }
}

impl VolumeRegistry {
    pub(crate) fn new(ids: Box<dyn IdSource>) -> Self {
        Self {
            entries: Vec::new(),
            ids,
        }
    }

    /// Allocates an identifier, launches the worker, and records the entry.
    ///
    /// Nothing is recorded when `launch` fails.
    pub(crate) fn register<F>(
        &mut self,
        options: MountOptions,
        launch: F,
    ) -> Result<InstanceId, SpawnError>
    where
        F: FnOnce(InstanceId, &MountOptions) -> Result<Box<dyn Worker>, SpawnError>,
    {
        let instance = self.allocate_id();
        let worker = launch(instance, &options)?;
        self.entries
            .push(VolumeEntry::starting(instance, options, worker));
        Ok(instance)
    }

    fn allocate_id(&mut self) -> InstanceId {
        loop {
            let candidate = InstanceId::new(self.ids.next_id());
            if self.get(candidate).is_none() {
                return candidate;
            }
        }
    }

    pub(crate) fn get(&self, instance: InstanceId) -> Option<&VolumeEntry> {
        self.entries.iter().find(|entry| entry.instance() == instance)
    }

    pub(crate) fn find_by_mount_point(&self, mount_point: &str) -> Option<&VolumeEntry> {
        self.entries
            .iter()
            .find(|entry| entry.options().mount_point() == mount_point)
    }

    /// Records the filesystem a worker reported. Returns `false` on a miss.
    pub(crate) fn mark_mounted(
        &mut self,
        instance: InstanceId,
        fs_uuid: Uuid,
        label: Option<String>,
    ) -> bool {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.instance() == instance)
        else {
            return false;
        };
        entry.attach_filesystem(fs_uuid, label);
        true
    }

    pub(crate) fn remove(&mut self, instance: InstanceId) -> Option<VolumeEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.instance() == instance)?;
        Some(self.entries.remove(index))
    }

    /// Drops every entry whose worker has exited.
    ///
    /// An entry whose worker cannot be polled is kept and logged.
    pub(crate) fn reap_exited(&mut self) -> Vec<ReapedVolume> {
        let mut reaped = Vec::new();
        self.entries.retain_mut(|entry| match entry.worker_mut().try_exit() {
            Ok(Some(exit)) => {
                info!(
                    target: REGISTRY_TARGET,
                    instance = %entry.instance(),
                    %exit,
                    "worker exited; removing volume"
                );
                reaped.push(ReapedVolume {
                    instance: entry.instance(),
                    mount_point: entry.options().mount_point().to_owned(),
                    exit,
                });
                false
            }
            Ok(None) => true,
            Err(error) => {
                warn!(
                    target: REGISTRY_TARGET,
                    instance = %entry.instance(),
                    %error,
                    "failed to poll worker"
                );
                true
            }
        });
        reaped
    }

    /// Removes and returns every entry, leaving the registry empty.
    pub(crate) fn drain(&mut self) -> Vec<VolumeEntry> {
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn records(&self) -> Vec<VolumeRecord> {
        self.entries.iter().map(VolumeEntry::to_record).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
