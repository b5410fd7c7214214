//! Socket listener for the control endpoint.
//!
//! The transport binds the configured endpoint and services connections one
//! at a time on a single background thread. Each accepted connection carries
//! exactly one exchange, handled to completion before the next accept.

mod errors;
mod exchange;
mod handler;
mod listener;
#[cfg(test)]
mod listener_tests;
mod socket;
#[cfg(test)]
mod test_utils;

pub use self::errors::{HandlerFault, ListenerError};
#[cfg(unix)]
pub use self::errors::StaleSocketError;
pub(crate) use self::exchange::{MessageRead, read_message, write_message};
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream};
pub(crate) use self::listener::{FaultHook, ListenerHandle, SocketListener};
#[cfg(test)]
pub(crate) use self::test_utils::{CountingHandler, FaultingHandler};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
