//! A single registered volume.

use uuid::Uuid;

use btrmount_protocol::{InstanceId, MountOptions, VolumeRecord, VolumeState};

use crate::supervisor::Worker;

/// One mounted, or mounting, volume and the worker serving it.
#[derive(Debug)]
pub(crate) struct VolumeEntry {
    instance: InstanceId,
    options: MountOptions,
    state: VolumeState,
    fs_uuid: Option<Uuid>,
    label: Option<String>,
    worker: Box<dyn Worker>,
}

impl VolumeEntry {
    pub(crate) fn starting(
        instance: InstanceId,
        options: MountOptions,
        worker: Box<dyn Worker>,
    ) -> Self {
        Self {
            instance,
            options,
            state: VolumeState::Starting,
            fs_uuid: None,
            label: None,
            worker,
        }
    }

    pub(crate) const fn instance(&self) -> InstanceId {
        self.instance
    }

    pub(crate) const fn options(&self) -> &MountOptions {
        &self.options
    }

    pub(crate) const fn state(&self) -> VolumeState {
        self.state
    }

    pub(crate) fn worker_pid(&self) -> u32 {
        self.worker.pid()
    }

    pub(crate) fn worker_mut(&mut self) -> &mut dyn Worker {
        self.worker.as_mut()
    }

    pub(crate) fn attach_filesystem(&mut self, fs_uuid: Uuid, label: Option<String>) {
        self.fs_uuid = Some(fs_uuid);
        self.label = label;
        self.state = VolumeState::Mounted;
    }

    /// Wire description of the entry.
    pub(crate) fn to_record(&self) -> VolumeRecord {
        VolumeRecord {
            instance: Some(self.instance),
            state: Some(self.state),
            fs_uuid: self.fs_uuid,
            label: self.label.clone(),
            options: self.options.to_raw(),
        }
    }
}
