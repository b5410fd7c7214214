//! Error types for worker launches.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Reasons a worker process could not be started.
#[derive(Debug, Clone, Error)]
pub enum SpawnError {
    /// The worker executable does not exist.
    #[error("worker executable '{executable}' was not found")]
    NotFound {
        /// Executable that was looked up.
        executable: String,
        /// Underlying OS error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The worker executable exists but may not be run.
    #[error("permission denied launching worker '{executable}'")]
    PermissionDenied {
        /// Executable that was refused.
        executable: String,
        /// Underlying OS error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Any other launch failure reported by the operating system.
    #[error("failed to launch worker '{executable}': {source}")]
    Os {
        /// Executable that failed to start.
        executable: String,
        /// Underlying OS error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl SpawnError {
    pub(crate) fn from_io(executable: impl Into<String>, source: io::Error) -> Self {
        let executable = executable.into();
        let source = Arc::new(source);
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { executable, source },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { executable, source },
            _ => Self::Os { executable, source },
        }
    }

    /// Executable named by the failed launch.
    pub fn executable(&self) -> &str {
        match self {
            Self::NotFound { executable, .. }
            | Self::PermissionDenied { executable, .. }
            | Self::Os { executable, .. } => executable,
        }
    }
}
