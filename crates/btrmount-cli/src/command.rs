//! Command-line grammar and the requests each command sends.

use clap::{Args, Parser, Subcommand};

use btrmount_protocol::{RawMountOptions, Request};

use crate::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "btrmount",
    version,
    about = "Mounts and lists btrfs volumes served by btrmountd",
    disable_help_subcommand = true,
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Starts a worker that mounts a volume.
    Mount(MountArgs),
    /// Lists the volumes known to the service.
    List,
    /// Stops the worker serving a mount point.
    Unmount(UnmountArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub(crate) struct MountArgs {
    /// Mount the subvolume with the given name (case-sensitive).
    #[arg(long, value_name = "NAME", conflicts_with = "subvol_id")]
    pub(crate) subvol: Option<String>,
    /// Mount the subvolume with the given ID.
    #[arg(long = "subvol-id", value_name = "ID")]
    pub(crate) subvol_id: Option<u64>,
    /// Dump filesystem trees to the given file.
    #[arg(long, value_name = "FILE")]
    pub(crate) dump: Option<String>,
    /// Stop just short of actually mounting the volume.
    #[arg(long = "test-run")]
    pub(crate) test_run: bool,
    /// Where the volume should appear.
    #[arg(value_name = "MOUNT_POINT")]
    pub(crate) mount_point: String,
    /// Member devices of the filesystem.
    #[arg(value_name = "DEVICE", required = true, num_args = 1..)]
    pub(crate) devices: Vec<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnmountArgs {
    /// Mount point of the volume to release.
    #[arg(value_name = "MOUNT_POINT")]
    pub(crate) mount_point: String,
}

/// Reply shape a command considers success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExpectedReply {
    Ok,
    Listing,
}

impl CliCommand {
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::Mount(_) => "mount",
            Self::List => "list",
            Self::Unmount(_) => "unmount",
        }
    }

    pub(crate) const fn expected_reply(&self) -> ExpectedReply {
        match self {
            Self::Mount(_) | Self::Unmount(_) => ExpectedReply::Ok,
            Self::List => ExpectedReply::Listing,
        }
    }

    /// Builds the request, validating mount options before anything is sent.
    pub(crate) fn to_request(&self) -> Result<Request, AppError> {
        match self {
            Self::Mount(args) => {
                let options = RawMountOptions {
                    mount_point: Some(args.mount_point.clone()),
                    devices: args.devices.clone(),
                    subvol_name: args.subvol.clone(),
                    subvol_id: args.subvol_id,
                    dump_target: args.dump.clone(),
                    test_run: args.test_run,
                }
                .build()?;
                Ok(Request::mount(&options))
            }
            Self::List => Ok(Request::List),
            Self::Unmount(args) => Ok(Request::unmount_mount_point(args.mount_point.clone())),
        }
    }
}
