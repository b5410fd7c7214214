//! Failures of the control socket listener.

use std::io;

use thiserror::Error;

/// Why a leftover socket file could not be replaced.
#[cfg(unix)]
#[derive(Debug, Error)]
pub enum StaleSocketError {
    /// Another service answered on the path.
    #[error("another process is already listening")]
    InUse,
    /// The path exists but is not a socket, so it is left alone.
    #[error("the path exists and is not a socket")]
    NotSocket,
    /// The existing path could not be examined.
    #[error("failed to inspect the existing path: {0}")]
    Inspect(#[source] io::Error),
    /// Connecting to the existing socket failed for a reason other than refusal.
    #[error("failed to connect to the existing socket: {0}")]
    Connect(#[source] io::Error),
    /// The dead socket could not be deleted.
    #[error("failed to remove the dead socket: {0}")]
    Remove(#[source] io::Error),
}

/// Errors surfaced while binding or running the control socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP host name did not resolve.
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        /// Endpoint as configured.
        endpoint: String,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// The TCP host name resolved to nothing.
    #[error("{endpoint} resolved to no addresses")]
    NoAddress {
        /// Endpoint as configured.
        endpoint: String,
    },
    /// A leftover socket file blocked the Unix path.
    #[cfg(unix)]
    #[error("cannot reuse {endpoint}: {source}")]
    StaleSocket {
        /// Endpoint as configured.
        endpoint: String,
        /// What went wrong with the leftover file.
        #[source]
        source: StaleSocketError,
    },
    /// Unix endpoints require a Unix host.
    #[cfg(not(unix))]
    #[error("unix sockets are unsupported for endpoint {endpoint}")]
    UnsupportedUnix {
        /// Endpoint as configured.
        endpoint: String,
    },
    /// The operating system refused the bind.
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        /// Endpoint as configured.
        endpoint: String,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// The bound socket could not be switched to non-blocking accepts.
    #[error("failed to configure the listening socket: {0}")]
    Configure(#[source] io::Error),
    /// The listener thread could not be created.
    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[source] io::Error),
    /// A handler reported an internal fault and the listener stopped.
    #[error("listener stopped after an internal fault: {0}")]
    Fault(#[from] HandlerFault),
    /// The listener thread itself panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}

impl ListenerError {
    /// Returns `true` when the listener ran and then stopped abnormally, as
    /// opposed to failing to start.
    #[must_use]
    pub const fn is_internal_fault(&self) -> bool {
        matches!(self, Self::Fault(_) | Self::ThreadPanic)
    }
}

/// Unrecoverable condition raised by a connection handler.
///
/// Ordinary transport and protocol failures never produce a fault; they are
/// logged and the listener moves on to the next connection.
#[derive(Debug, Clone, Error)]
#[error("internal fault: {message}")]
pub struct HandlerFault {
    message: String,
}

impl HandlerFault {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Builds a fault from a panic payload caught around a handler.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|text| (*text).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "no panic message".to_owned());
        Self::new(format!("connection handler panicked: {detail}"))
    }
}
