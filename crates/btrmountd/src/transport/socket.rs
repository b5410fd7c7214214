//! Binding the control endpoint.
//!
//! A Unix endpoint leaves a socket file behind. The service owns that file
//! from a successful bind until the [`BoundSocket`] is dropped, at which
//! point the file is removed. A file left by a service that died is replaced
//! on the next bind, but only after a connection attempt is refused.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::{fs, path::Path, path::PathBuf};

#[cfg(unix)]
use tracing::{debug, warn};

use btrmount_config::SocketEndpoint;

use super::{ConnectionStream, ListenerError};
#[cfg(unix)]
use super::{LISTENER_TARGET, StaleSocketError};

/// A listening control socket, accepting without blocking.
#[derive(Debug)]
pub(crate) enum BoundSocket {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: UnixListener,
        file: SocketFile,
    },
}

impl BoundSocket {
    /// Binds `endpoint`, replacing a dead Unix socket file if one is found.
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        match endpoint {
            SocketEndpoint::Tcp { host, port } => {
                let addr = resolve(endpoint, host, *port)?;
                TcpListener::bind(addr)
                    .map(Self::Tcp)
                    .map_err(|source| ListenerError::Bind {
                        endpoint: endpoint.to_string(),
                        source,
                    })
            }
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => {
                let path = path.as_std_path();
                clear_dead_socket(path).map_err(|source| ListenerError::StaleSocket {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
                let listener = UnixListener::bind(path).map_err(|source| ListenerError::Bind {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
                Ok(Self::Unix {
                    listener,
                    file: SocketFile(path.to_path_buf()),
                })
            }
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => Err(ListenerError::UnsupportedUnix {
                endpoint: endpoint.to_string(),
            }),
        }
    }

    /// TCP address actually bound; `None` for Unix sockets.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Self::Unix { .. } => None,
        }
    }

    pub(crate) fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix { listener, .. } => listener.set_nonblocking(true),
        }
    }

    /// Accepts one pending connection as a blocking stream.
    ///
    /// Returns `Ok(None)` when nobody is waiting.
    pub(crate) fn accept(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Self::Unix { listener, .. } => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

fn resolve(endpoint: &SocketEndpoint, host: &str, port: u16) -> Result<SocketAddr, ListenerError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            endpoint: endpoint.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| ListenerError::NoAddress {
            endpoint: endpoint.to_string(),
        })
}

/// Socket file owned by a bound Unix listener; removed on drop.
#[cfg(unix)]
#[derive(Debug)]
pub(crate) struct SocketFile(PathBuf);

#[cfg(unix)]
impl Drop for SocketFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.0) {
            Ok(()) => debug!(
                target: LISTENER_TARGET,
                path = %self.0.display(),
                "removed control socket"
            ),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => warn!(
                target: LISTENER_TARGET,
                path = %self.0.display(),
                error = %error,
                "failed to remove control socket"
            ),
        }
    }
}

#[cfg(unix)]
fn clear_dead_socket(path: &Path) -> Result<(), StaleSocketError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(StaleSocketError::Inspect(error)),
    };
    if !metadata.file_type().is_socket() {
        return Err(StaleSocketError::NotSocket);
    }
    match UnixStream::connect(path) {
        Ok(_) => Err(StaleSocketError::InUse),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            debug!(
                target: LISTENER_TARGET,
                path = %path.display(),
                "replacing dead control socket"
            );
            fs::remove_file(path).map_err(StaleSocketError::Remove)
        }
        Err(error) => Err(StaleSocketError::Connect(error)),
    }
}
