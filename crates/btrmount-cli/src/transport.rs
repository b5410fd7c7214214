//! Socket transport helpers for the `btrmount` CLI.
//!
//! One exchange per connection: the request is written in full, the write
//! side is shut down to mark its end, and the reply is read until the
//! service closes the connection or the reply window elapses.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use btrmount_config::SocketEndpoint;
use btrmount_protocol::MAX_MESSAGE_BYTES;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};

use crate::AppError;

const READ_CHUNK: usize = 8 * 1024;

pub(crate) enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection {
    fn shutdown_write(&self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(Shutdown::Write),
            #[cfg(unix)]
            Self::Unix(stream) => stream.shutdown(Shutdown::Write),
        }
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_read_timeout(timeout),
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_read_timeout(timeout),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

pub(crate) fn connect(endpoint: &SocketEndpoint, timeout: Duration) -> Result<Connection, AppError> {
    match endpoint {
        SocketEndpoint::Tcp { host, port } => {
            let endpoint_display = endpoint.to_string();
            let address = resolve_tcp_address(host, *port).map_err(|source| AppError::Resolve {
                endpoint: endpoint_display.clone(),
                source,
            })?;

            TcpStream::connect_timeout(&address, timeout)
                .map(Connection::Tcp)
                .map_err(|source| AppError::Connect {
                    endpoint: endpoint_display,
                    source,
                })
        }
        SocketEndpoint::Unix { path } => {
            #[cfg(unix)]
            {
                connect_unix(path.as_str(), timeout).map_err(|source| AppError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                })
            }

            #[cfg(not(unix))]
            {
                let _ = (path, timeout);
                Err(AppError::UnsupportedUnixTransport(endpoint.to_string()))
            }
        }
    }
}

/// Sends `request` and returns the reply text.
///
/// A zero `reply_window` waits indefinitely.
pub(crate) fn exchange(
    connection: &mut Connection,
    request: &str,
    reply_window: Duration,
) -> Result<String, AppError> {
    connection
        .write_all(request.as_bytes())
        .and_then(|()| connection.flush())
        .map_err(AppError::SendRequest)?;
    connection.shutdown_write().map_err(AppError::SendRequest)?;

    let bytes = read_reply(connection, reply_window)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_reply(connection: &mut Connection, window: Duration) -> Result<Vec<u8>, AppError> {
    let deadline = (!window.is_zero()).then(|| Instant::now() + window);
    let timed_out = || AppError::ReplyTimeout { timeout: window };
    let mut reply = Vec::new();
    let mut chunk = [0_u8; READ_CHUNK];

    loop {
        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out());
            }
            connection
                .set_read_timeout(Some(remaining))
                .map_err(AppError::ReadReply)?;
        }
        match connection.read(&mut chunk) {
            Ok(0) => return Ok(reply),
            Ok(read) => {
                reply.extend_from_slice(chunk.get(..read).unwrap_or_default());
                if reply.len() > MAX_MESSAGE_BYTES {
                    return Err(AppError::OversizedReply {
                        limit: MAX_MESSAGE_BYTES,
                    });
                }
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                return Err(timed_out());
            }
            Err(error) => return Err(AppError::ReadReply(error)),
        }
    }
}

fn resolve_tcp_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}

#[cfg(unix)]
fn connect_unix(path: &str, timeout: Duration) -> io::Result<Connection> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path)?;
    socket.connect_timeout(&address, timeout)?;
    let stream: UnixStream = socket.into();
    Ok(Connection::Unix(stream))
}
