use uuid::Uuid;

use crate::decode::{Decoded, IssueKind, IssueLog, LineIssue};
use crate::field::{
    Field, KEY_FS_UUID, KEY_INSTANCE_ID, KEY_LABEL, KEY_MOUNT_POINT, RecordReader, RecordWriter,
};
use crate::instance::InstanceId;
use crate::options::{Absorb, MountOptions, RawMountOptions};

const KIND_MOUNT: &str = "Mount";
const KIND_LIST: &str = "List";
const KIND_DRV_MOUNT_DATA: &str = "DrvMountData";
const KIND_DRV_MOUNTED: &str = "DrvMounted";
const KIND_UNMOUNT: &str = "Unmount";

/// A message sent to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Start a worker for a new volume.
    Mount(RawMountOptions),
    /// Enumerate the registered volumes.
    List,
    /// A worker asks for the options it was started with.
    DrvMountData {
        /// Instance the worker was started as.
        instance: Option<InstanceId>,
    },
    /// A worker reports the filesystem it mounted.
    DrvMounted {
        /// Instance the worker was started as.
        instance: Option<InstanceId>,
        /// Filesystem UUID read from the superblock.
        fs_uuid: Option<Uuid>,
        /// Filesystem label, when set.
        label: Option<String>,
    },
    /// Stop a volume's worker and forget the volume.
    Unmount {
        /// Volume selected by instance.
        instance: Option<InstanceId>,
        /// Volume selected by mount point.
        mount_point: Option<String>,
    },
    /// Any header the service does not understand, including an empty one.
    Unknown(String),
}

impl Request {
    /// Builds a `Mount` request from validated options.
    #[must_use]
    pub fn mount(options: &MountOptions) -> Self {
        Self::Mount(options.to_raw())
    }

    /// Builds a `DrvMountData` request.
    #[must_use]
    pub const fn drv_mount_data(instance: InstanceId) -> Self {
        Self::DrvMountData {
            instance: Some(instance),
        }
    }

    /// Builds a `DrvMounted` report.
    #[must_use]
    pub const fn drv_mounted(instance: InstanceId, fs_uuid: Uuid, label: Option<String>) -> Self {
        Self::DrvMounted {
            instance: Some(instance),
            fs_uuid: Some(fs_uuid),
            label,
        }
    }

    /// Builds an `Unmount` request addressed by mount point.
    #[must_use]
    pub fn unmount_mount_point(mount_point: impl Into<String>) -> Self {
        Self::Unmount {
            instance: None,
            mount_point: Some(mount_point.into()),
        }
    }

    /// Message kind as written on the header line.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Mount(_) => KIND_MOUNT,
            Self::List => KIND_LIST,
            Self::DrvMountData { .. } => KIND_DRV_MOUNT_DATA,
            Self::DrvMounted { .. } => KIND_DRV_MOUNTED,
            Self::Unmount { .. } => KIND_UNMOUNT,
            Self::Unknown(kind) => kind,
        }
    }

    /// Renders the request in wire form.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut writer = RecordWriter::header(self.kind());
        match self {
            Self::Mount(options) => options.encode(&mut writer),
            Self::List | Self::Unknown(_) => {}
            Self::DrvMountData { instance } => {
                if let Some(instance) = instance {
                    writer.plain(KEY_INSTANCE_ID, instance);
                }
            }
            Self::DrvMounted {
                instance,
                fs_uuid,
                label,
            } => {
                if let Some(instance) = instance {
                    writer.plain(KEY_INSTANCE_ID, instance);
                }
                if let Some(fs_uuid) = fs_uuid {
                    writer.plain(KEY_FS_UUID, fs_uuid.hyphenated());
                }
                if let Some(label) = label {
                    writer.counted(KEY_LABEL, label);
                }
            }
            Self::Unmount {
                instance,
                mount_point,
            } => {
                if let Some(instance) = instance {
                    writer.plain(KEY_INSTANCE_ID, instance);
                }
                if let Some(mount_point) = mount_point {
                    writer.counted(KEY_MOUNT_POINT, mount_point);
                }
            }
        }
        writer.finish()
    }

    /// Decodes a request, skipping any record that cannot be understood.
    ///
    /// Decoding never fails: an unrecognised header yields
    /// [`Request::Unknown`] and its body is ignored.
    #[must_use]
    pub fn decode(text: &str) -> Decoded<Self> {
        let (header, body) = text.split_once('\n').unwrap_or((text, ""));
        let mut issues = IssueLog::default();
        let mut reader = RecordReader::new(body, 1);

        let request = match header {
            KIND_MOUNT => {
                let mut options = RawMountOptions::default();
                for_each_field(&mut reader, &mut issues, |field| {
                    match options.absorb(field) {
                        Absorb::Taken => Ok(()),
                        Absorb::Duplicate => Err(IssueKind::DuplicateField),
                        Absorb::Declined(_) => Err(IssueKind::UnexpectedField),
                    }
                });
                Self::Mount(options)
            }
            KIND_LIST => {
                for_each_field(&mut reader, &mut issues, |_| Err(IssueKind::UnexpectedField));
                Self::List
            }
            KIND_DRV_MOUNT_DATA => {
                let mut instance = None;
                for_each_field(&mut reader, &mut issues, |field| match field {
                    Field::InstanceId(id) => set_once(&mut instance, id),
                    _ => Err(IssueKind::UnexpectedField),
                });
                Self::DrvMountData { instance }
            }
            KIND_DRV_MOUNTED => {
                let (mut instance, mut fs_uuid, mut label) = (None, None, None);
                for_each_field(&mut reader, &mut issues, |field| match field {
                    Field::InstanceId(id) => set_once(&mut instance, id),
                    Field::FsUuid(uuid) => set_once(&mut fs_uuid, uuid),
                    Field::Label(text) => set_once(&mut label, text),
                    _ => Err(IssueKind::UnexpectedField),
                });
                Self::DrvMounted {
                    instance,
                    fs_uuid,
                    label,
                }
            }
            KIND_UNMOUNT => {
                let (mut instance, mut mount_point) = (None, None);
                for_each_field(&mut reader, &mut issues, |field| match field {
                    Field::InstanceId(id) => set_once(&mut instance, id),
                    Field::MountPoint(point) => set_once(&mut mount_point, point),
                    _ => Err(IssueKind::UnexpectedField),
                });
                Self::Unmount {
                    instance,
                    mount_point,
                }
            }
            other => Self::Unknown(other.to_owned()),
        };

        Decoded::new(request, issues.into_issues())
    }
}

pub(crate) fn set_once<T>(slot: &mut Option<T>, value: T) -> Result<(), IssueKind> {
    if slot.is_some() {
        return Err(IssueKind::DuplicateField);
    }
    *slot = Some(value);
    Ok(())
}

/// Feeds every readable record to `accept`, logging whatever is rejected.
pub(crate) fn for_each_field(
    reader: &mut RecordReader<'_>,
    issues: &mut IssueLog,
    mut accept: impl FnMut(Field) -> Result<(), IssueKind>,
) {
    while let Some(record) = reader.next_record() {
        match record {
            Ok(field) => {
                let excerpt = format!("{field:?}");
                if let Err(kind) = accept(field) {
                    issues.record(LineIssue::new(reader.last_line(), kind, &excerpt));
                }
            }
            Err(issue) => issues.record(issue),
        }
    }
}
