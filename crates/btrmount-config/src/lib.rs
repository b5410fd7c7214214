//! Shared configuration for the `btrmountd` service and the `btrmount` CLI.
//!
//! Values are layered by `ortho_config`: built-in defaults, then a TOML file
//! named by `--config-path` (or `BTRMOUNT_CONFIG_PATH`), then `BTRMOUNT_*`
//! environment variables, then command-line flags. Both binaries load the
//! same [`Config`] so that they agree on the control socket location.

mod defaults;
mod logging;
mod socket;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_EXCHANGE_TIMEOUT_MS, DEFAULT_LOG_FILTER,
    DEFAULT_REPLY_TIMEOUT_MS, DEFAULT_TCP_PORT, DEFAULT_WORKER_BINARY,
    DEFAULT_WORKER_STOP_TIMEOUT_MS, default_log_filter, default_log_filter_string,
    default_log_format, default_socket_endpoint, default_worker_binary,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved configuration shared by the daemon and the CLI.
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "BTRMOUNT")]
pub struct Config {
    /// Control socket served by the daemon.
    #[serde(default = "default_socket_endpoint")]
    #[ortho_config(default = default_socket_endpoint())]
    pub daemon_socket: SocketEndpoint,
    /// `tracing` filter directives applied by the daemon.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format of the daemon's log stream.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Worker executable launched for each accepted mount.
    #[serde(default = "default_worker_binary")]
    #[ortho_config(default = default_worker_binary())]
    pub worker_binary: String,
    /// How long the CLI waits to establish a connection.
    #[serde(default = "defaults::default_connect_timeout_ms")]
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,
    /// How long the CLI waits for a reply once its request is sent.
    #[serde(default = "defaults::default_reply_timeout_ms")]
    #[ortho_config(default = DEFAULT_REPLY_TIMEOUT_MS)]
    pub reply_timeout_ms: u64,
    /// Read/write timeout the daemon applies to each exchange.
    #[serde(default = "defaults::default_exchange_timeout_ms")]
    #[ortho_config(default = DEFAULT_EXCHANGE_TIMEOUT_MS)]
    pub exchange_timeout_ms: u64,
    /// Grace period between asking a worker to stop and killing it.
    #[serde(default = "defaults::default_worker_stop_timeout_ms")]
    #[ortho_config(default = DEFAULT_WORKER_STOP_TIMEOUT_MS)]
    pub worker_stop_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            worker_binary: default_worker_binary(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            exchange_timeout_ms: DEFAULT_EXCHANGE_TIMEOUT_MS,
            worker_stop_timeout_ms: DEFAULT_WORKER_STOP_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is treated as the program name, mirroring
    /// [`std::env::args_os`].
    pub fn load_from_iter<I>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = OsString>,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Control socket served by the daemon.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Log filter directives.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Worker executable name or path.
    #[must_use]
    pub fn worker_binary(&self) -> &str {
        &self.worker_binary
    }

    /// Client connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Client reply timeout.
    #[must_use]
    pub const fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// Per-exchange timeout applied by the daemon.
    #[must_use]
    pub const fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }

    /// Worker stop grace period.
    #[must_use]
    pub const fn worker_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_stop_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_constants() {
        let config = Config::default();
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.worker_binary(), DEFAULT_WORKER_BINARY);
        assert_eq!(config.reply_timeout(), Duration::from_millis(1_000));
        assert_eq!(config.connect_timeout(), Duration::from_millis(1_000));
        assert_eq!(config.daemon_socket(), &default_socket_endpoint());
    }

    #[test]
    fn loading_with_only_a_program_name_yields_the_defaults() {
        let config = Config::load_from_iter([OsString::from("btrmount")])
            .expect("configuration should load from defaults alone");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn table_and_uri_socket_forms_are_equivalent() {
        #[derive(Deserialize)]
        struct Wrapper {
            daemon_socket: SocketEndpoint,
        }

        let from_uri: Wrapper =
            serde_json::from_str(r#"{ "daemon_socket": "tcp://127.0.0.1:9780" }"#)
                .expect("uri form");
        let from_table: Wrapper = serde_json::from_str(
            r#"{ "daemon_socket": { "transport": "tcp", "host": "127.0.0.1", "port": 9780 } }"#,
        )
        .expect("table form");
        assert_eq!(from_uri.daemon_socket, from_table.daemon_socket);
    }
}
