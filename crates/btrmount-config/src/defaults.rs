use camino::Utf8PathBuf;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Default TCP port used when Unix domain sockets are not available.
pub const DEFAULT_TCP_PORT: u16 = 9780;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Executable launched for each mount when none is configured.
pub const DEFAULT_WORKER_BINARY: &str = "btrmount-worker";

/// Client connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1_000;

/// Client reply timeout in milliseconds.
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 1_000;

/// Per-exchange socket timeout applied by the daemon, in milliseconds.
pub const DEFAULT_EXCHANGE_TIMEOUT_MS: u64 = 5_000;

/// Grace period granted to a worker between `SIGTERM` and `SIGKILL`.
pub const DEFAULT_WORKER_STOP_TIMEOUT_MS: u64 = 5_000;

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned worker executable name.
#[must_use]
pub fn default_worker_binary() -> String {
    DEFAULT_WORKER_BINARY.to_owned()
}

pub(crate) const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

pub(crate) const fn default_reply_timeout_ms() -> u64 {
    DEFAULT_REPLY_TIMEOUT_MS
}

pub(crate) const fn default_exchange_timeout_ms() -> u64 {
    DEFAULT_EXCHANGE_TIMEOUT_MS
}

pub(crate) const fn default_worker_stop_timeout_ms() -> u64 {
    DEFAULT_WORKER_STOP_TIMEOUT_MS
}

/// Computes the default socket endpoint for the daemon.
///
/// Prefers `$XDG_RUNTIME_DIR/btrmount/btrmountd.sock`. Without a runtime
/// directory the socket lives under the temporary directory, namespaced by
/// effective user ID so that users never share a socket.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    default_socket_endpoint_inner()
}

#[cfg(unix)]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("btrmount");
    if apply_namespace {
        base.push(user_namespace());
    }

    SocketEndpoint::unix(base.join("btrmountd.sock"))
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(std::env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}
