use thiserror::Error;

use crate::field::{
    Field, KEY_DEVICE, KEY_DUMP, KEY_MOUNT_POINT, KEY_SUBVOL, KEY_SUBVOL_ID, KEY_TEST_RUN,
    RecordWriter,
};

/// Subvolume IDs `1..=255` and `u64::MAX - 254..=u64::MAX - 1` address
/// internal trees rather than mountable subvolumes.
const RESERVED_LOW: std::ops::RangeInclusive<u64> = 1..=0xff;
const RESERVED_HIGH: std::ops::RangeInclusive<u64> = (u64::MAX - 0xfe)..=(u64::MAX - 1);

/// Which subvolume the worker should expose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubvolumeSelector {
    /// Whatever the filesystem marks as its default subvolume.
    #[default]
    Default,
    /// Subvolume looked up by name.
    ByName(String),
    /// Subvolume looked up by object ID; `0` is the top-level tree.
    ById(u64),
}

/// Validated mount configuration. Built once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOptions {
    mount_point: String,
    devices: Vec<String>,
    subvolume: SubvolumeSelector,
    dump_target: Option<String>,
    test_run: bool,
}

impl MountOptions {
    /// Directory (or drive) the volume is exposed at.
    #[must_use]
    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// Member devices, in the order given.
    #[must_use]
    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    /// Subvolume selection.
    #[must_use]
    pub const fn subvolume(&self) -> &SubvolumeSelector {
        &self.subvolume
    }

    /// File the worker should dump filesystem metadata to, if any.
    #[must_use]
    pub fn dump_target(&self) -> Option<&str> {
        self.dump_target.as_deref()
    }

    /// Whether the worker should validate the filesystem without mounting.
    #[must_use]
    pub const fn test_run(&self) -> bool {
        self.test_run
    }

    /// Converts back into the unvalidated form used on the wire.
    #[must_use]
    pub fn to_raw(&self) -> RawMountOptions {
        let (subvol_name, subvol_id) = match &self.subvolume {
            SubvolumeSelector::Default => (None, None),
            SubvolumeSelector::ByName(name) => (Some(name.clone()), None),
            SubvolumeSelector::ById(id) => (None, Some(*id)),
        };
        RawMountOptions {
            mount_point: Some(self.mount_point.clone()),
            devices: self.devices.clone(),
            subvol_name,
            subvol_id,
            dump_target: self.dump_target.clone(),
            test_run: self.test_run,
        }
    }
}

/// Reasons a set of mount fields cannot become [`MountOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MountOptionsError {
    /// No mount point, or an empty one.
    #[error("a mount point is required")]
    MissingMountPoint,
    /// The device list was empty.
    #[error("at least one device is required")]
    NoDevices,
    /// A device path was empty.
    #[error("device paths must not be empty")]
    EmptyDevice,
    /// Both a subvolume name and a subvolume ID were given.
    #[error("a subvolume may be selected by name or by ID, not both")]
    ConflictingSubvolume,
    /// The subvolume ID addresses an internal tree.
    #[error("{0} is an impossible subvolume ID")]
    ImpossibleSubvolumeId(u64),
}

/// Mount fields exactly as they appeared in a message, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMountOptions {
    /// `MountPoint` field.
    pub mount_point: Option<String>,
    /// `Device` fields in order.
    pub devices: Vec<String>,
    /// `Option|Subvol` field.
    pub subvol_name: Option<String>,
    /// `Option|SubvolID` field.
    pub subvol_id: Option<u64>,
    /// `Option|Dump` field.
    pub dump_target: Option<String>,
    /// `Option|TestRun` flag.
    pub test_run: bool,
}

/// Outcome of offering a field to a [`RawMountOptions`].
pub(crate) enum Absorb {
    Taken,
    Duplicate,
    Declined(Field),
}

impl RawMountOptions {
    /// Validates the fields.
    pub fn build(self) -> Result<MountOptions, MountOptionsError> {
        let mount_point = self
            .mount_point
            .filter(|point| !point.is_empty())
            .ok_or(MountOptionsError::MissingMountPoint)?;
        if self.devices.is_empty() {
            return Err(MountOptionsError::NoDevices);
        }
        if self.devices.iter().any(String::is_empty) {
            return Err(MountOptionsError::EmptyDevice);
        }
        let subvolume = match (self.subvol_name, self.subvol_id) {
            (Some(_), Some(_)) => return Err(MountOptionsError::ConflictingSubvolume),
            (Some(name), None) => SubvolumeSelector::ByName(name),
            (None, Some(id)) if RESERVED_LOW.contains(&id) || RESERVED_HIGH.contains(&id) => {
                return Err(MountOptionsError::ImpossibleSubvolumeId(id));
            }
            (None, Some(id)) => SubvolumeSelector::ById(id),
            (None, None) => SubvolumeSelector::Default,
        };

        Ok(MountOptions {
            mount_point,
            devices: self.devices,
            subvolume,
            dump_target: self.dump_target,
            test_run: self.test_run,
        })
    }

    pub(crate) fn absorb(&mut self, field: Field) -> Absorb {
        fn set_once<T>(slot: &mut Option<T>, value: T) -> Absorb {
            if slot.is_some() {
                return Absorb::Duplicate;
            }
            *slot = Some(value);
            Absorb::Taken
        }

        match field {
            Field::MountPoint(point) => set_once(&mut self.mount_point, point),
            Field::Device(device) => {
                self.devices.push(device);
                Absorb::Taken
            }
            Field::Subvol(name) => set_once(&mut self.subvol_name, name),
            Field::SubvolId(id) => set_once(&mut self.subvol_id, id),
            Field::Dump(target) => set_once(&mut self.dump_target, target),
            Field::TestRun(flag) => {
                self.test_run = flag;
                Absorb::Taken
            }
            other => Absorb::Declined(other),
        }
    }

    pub(crate) fn encode(&self, writer: &mut RecordWriter) {
        if let Some(name) = &self.subvol_name {
            writer.counted(KEY_SUBVOL, name);
        }
        if let Some(id) = self.subvol_id {
            writer.plain(KEY_SUBVOL_ID, id);
        }
        if let Some(target) = &self.dump_target {
            writer.counted(KEY_DUMP, target);
        }
        if self.test_run {
            writer.marker(KEY_TEST_RUN);
        }
        if let Some(point) = &self.mount_point {
            writer.counted(KEY_MOUNT_POINT, point);
        }
        for device in &self.devices {
            writer.counted(KEY_DEVICE, device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn minimal() -> RawMountOptions {
        RawMountOptions {
            mount_point: Some("/mnt/data".to_owned()),
            devices: vec!["/dev/sdb1".to_owned()],
            ..RawMountOptions::default()
        }
    }

    #[test]
    fn minimal_options_build() {
        let options = minimal().build().expect("valid options");
        assert_eq!(options.mount_point(), "/mnt/data");
        assert_eq!(options.devices(), ["/dev/sdb1".to_owned()]);
        assert_eq!(options.subvolume(), &SubvolumeSelector::Default);
        assert!(!options.test_run());
        assert_eq!(options.dump_target(), None);
    }

    #[rstest]
    #[case::no_mount_point(RawMountOptions { mount_point: None, ..minimal() }, MountOptionsError::MissingMountPoint)]
    #[case::empty_mount_point(RawMountOptions { mount_point: Some(String::new()), ..minimal() }, MountOptionsError::MissingMountPoint)]
    #[case::no_devices(RawMountOptions { devices: Vec::new(), ..minimal() }, MountOptionsError::NoDevices)]
    #[case::empty_device(RawMountOptions { devices: vec![String::new()], ..minimal() }, MountOptionsError::EmptyDevice)]
    #[case::both_selectors(RawMountOptions { subvol_name: Some("home".to_owned()), subvol_id: Some(256), ..minimal() }, MountOptionsError::ConflictingSubvolume)]
    #[case::reserved_low(RawMountOptions { subvol_id: Some(5), ..minimal() }, MountOptionsError::ImpossibleSubvolumeId(5))]
    #[case::reserved_high(RawMountOptions { subvol_id: Some(u64::MAX - 1), ..minimal() }, MountOptionsError::ImpossibleSubvolumeId(u64::MAX - 1))]
    fn invalid_options_are_rejected(
        #[case] raw: RawMountOptions,
        #[case] expected: MountOptionsError,
    ) {
        assert_eq!(raw.build(), Err(expected));
    }

    #[rstest]
    #[case(0)]
    #[case(256)]
    #[case(u64::MAX)]
    #[case(u64::MAX - 0xff)]
    fn boundary_subvolume_ids_are_accepted(#[case] id: u64) {
        let raw = RawMountOptions {
            subvol_id: Some(id),
            ..minimal()
        };
        let options = raw.build().expect("id is mountable");
        assert_eq!(options.subvolume(), &SubvolumeSelector::ById(id));
    }

    #[test]
    fn to_raw_preserves_every_field() {
        let raw = RawMountOptions {
            subvol_name: Some("@home".to_owned()),
            dump_target: Some("/tmp/dump.txt".to_owned()),
            test_run: true,
            devices: vec!["/dev/sdb1".to_owned(), "/dev/sdc1".to_owned()],
            ..minimal()
        };
        let options = raw.clone().build().expect("valid options");
        assert_eq!(options.to_raw(), raw);
    }
}
