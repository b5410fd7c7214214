//! Request dispatch for the control socket.
//!
//! Each connection carries one request. The handler reads it, decodes it with
//! [`btrmount_protocol::Request::decode`], and hands it to the
//! [`CommandDispatcher`], which consults the volume registry and the worker
//! supervisor and produces exactly one reply:
//!
//! ```text
//! Mount\nMountPoint|4|/mnt\nDevice|8|/dev/sdb\n   ->   OK\n
//! List\n                                          ->   Data\nNo Entries\n
//! Bogus\n                                         ->   Error\nunrecognised command\n
//! ```
//!
//! Request-level failures become `Error` replies. Only an internal fault,
//! such as a poisoned registry lock, escapes to the transport and stops the
//! listener.

mod errors;
mod handler;
mod registry_manager;
mod router;

pub(crate) use self::errors::DispatchError;
pub(crate) use self::handler::DispatchConnectionHandler;
pub(crate) use self::registry_manager::RegistryManager;
pub(crate) use self::router::CommandDispatcher;
