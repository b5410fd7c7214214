//! Wire protocol spoken between `btrmountd`, its clients and its workers.
//!
//! Every exchange carries exactly one message in each direction. A message is
//! UTF-8 text: the first line names the message kind and each following
//! record carries one field. Fixed-size values are written as `Key|value`;
//! strings are written as `Key|<byteLength>|<bytes>` and read back by length,
//! so they may contain any character including `|` and newlines.
//!
//! Decoding is deliberately lax. Records that cannot be understood are
//! skipped, logged under the `btrmount_protocol` target, and reported in
//! [`Decoded::issues`]; the rest of the message is still used.
//!
//! ```text
//! Mount
//! Option|SubvolID|256
//! MountPoint|9|/mnt/data
//! Device|9|/dev/sdb1
//! ```

mod decode;
mod field;
mod instance;
mod options;
mod reply;
mod request;

pub use decode::{Decoded, IssueKind, LineIssue};
pub use instance::{InstanceId, InstanceIdParseError, VolumeState, VolumeStateParseError};
pub use options::{MountOptions, MountOptionsError, RawMountOptions, SubvolumeSelector};
pub use reply::{Reply, ReplyDecodeError, VolumeRecord};
pub use request::Request;

/// Largest message either side accepts, in bytes.
pub const MAX_MESSAGE_BYTES: usize = 100_000;

pub(crate) const PROTOCOL_TARGET: &str = env!("CARGO_PKG_NAME");
