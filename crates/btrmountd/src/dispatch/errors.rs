//! Error types for command dispatch.
//!
//! Every variant except [`DispatchError::Internal`] describes a rejected
//! request and is rendered verbatim into an `Error` reply.

use thiserror::Error;

use btrmount_protocol::{InstanceId, MountOptionsError};

use crate::supervisor::SpawnError;

/// Errors surfaced while dispatching a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request header named no known command.
    #[error("unrecognised command")]
    UnknownCommand,

    /// A field the command requires was absent or unreadable.
    #[error("missing required field {field}")]
    MissingField { field: &'static str },

    /// The mount fields failed validation.
    #[error("invalid mount options: {0}")]
    InvalidOptions(#[from] MountOptionsError),

    /// Another live volume already serves the mount point.
    #[error("mount point {mount_point} is already in use by instance {instance}")]
    MountPointInUse {
        mount_point: String,
        instance: InstanceId,
    },

    /// The worker process could not be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// No live volume has the given instance identifier.
    #[error("no volume with instance ID {instance}")]
    UnknownInstance { instance: InstanceId },

    /// No live volume is mounted at the given path.
    #[error("no volume is mounted at {mount_point}")]
    UnknownMountPoint { mount_point: String },

    /// Internal error (e.g., lock poisoned).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DispatchError {
    /// Returns `true` when the error should stop the service rather than be
    /// reported to the client.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Creates a missing field error.
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
