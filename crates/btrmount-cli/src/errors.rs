//! Error types and exit-status mapping for the CLI runtime.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use btrmount_protocol::{MountOptionsError, ReplyDecodeError};

/// Process exit statuses reported by `btrmount`.
pub(crate) mod status {
    pub(crate) const USAGE: u8 = 1;
    pub(crate) const CONNECT: u8 = 2;
    pub(crate) const LOST_CONNECTION: u8 = 3;
    pub(crate) const REPLY_TIMEOUT: u8 = 4;
    pub(crate) const UNINTELLIGIBLE_REPLY: u8 = 5;
    pub(crate) const EMPTY_DATA: u8 = 6;
    pub(crate) const SERVICE_ERROR: u8 = 7;
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("invalid mount options: {0}")]
    InvalidOptions(#[from] MountOptionsError),
    #[error("failed to resolve service address {endpoint}: {source}")]
    Resolve { endpoint: String, source: io::Error },
    #[error("failed to connect to btrmountd at {endpoint}: {source}")]
    Connect { endpoint: String, source: io::Error },
    #[cfg(not(unix))]
    #[error("platform does not support Unix sockets: {0}")]
    UnsupportedUnixTransport(String),
    #[error("failed to send request to btrmountd: {0}")]
    SendRequest(io::Error),
    #[error("lost connection to btrmountd: {0}")]
    ReadReply(io::Error),
    #[error("btrmountd closed the connection without replying")]
    EmptyReply,
    #[error("no reply from btrmountd within {}ms", .timeout.as_millis())]
    ReplyTimeout { timeout: Duration },
    #[error("reply from btrmountd exceeded {limit} bytes")]
    OversizedReply { limit: usize },
    #[error("unintelligible reply from btrmountd: {0}")]
    UnintelligibleReply(ReplyDecodeError),
    #[error("btrmountd sent an empty data reply")]
    EmptyData,
    #[error("btrmountd answered a {request} request with an unexpected {reply} reply")]
    UnexpectedReply {
        request: &'static str,
        reply: &'static str,
    },
    #[error("btrmountd reported an error: {0}")]
    Service(String),
    #[error("failed to write output: {0}")]
    WriteOutput(io::Error),
}

impl AppError {
    pub(crate) const fn status(&self) -> u8 {
        match self {
            Self::LoadConfiguration(_)
            | Self::CliUsage(_)
            | Self::InvalidOptions(_)
            | Self::WriteOutput(_) => status::USAGE,
            Self::Resolve { .. } | Self::Connect { .. } => status::CONNECT,
            #[cfg(not(unix))]
            Self::UnsupportedUnixTransport(_) => status::CONNECT,
            Self::SendRequest(_) | Self::ReadReply(_) | Self::EmptyReply => {
                status::LOST_CONNECTION
            }
            Self::ReplyTimeout { .. } => status::REPLY_TIMEOUT,
            Self::OversizedReply { .. }
            | Self::UnintelligibleReply(_)
            | Self::UnexpectedReply { .. } => status::UNINTELLIGIBLE_REPLY,
            Self::EmptyData => status::EMPTY_DATA,
            Self::Service(_) => status::SERVICE_ERROR,
        }
    }

    pub(crate) fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status())
    }
}

impl From<ReplyDecodeError> for AppError {
    fn from(error: ReplyDecodeError) -> Self {
        match error {
            ReplyDecodeError::Empty => Self::EmptyReply,
            ReplyDecodeError::EmptyData => Self::EmptyData,
            other @ ReplyDecodeError::UnknownKind(_) => Self::UnintelligibleReply(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::EmptyReply, 3)]
    #[case(AppError::ReplyTimeout { timeout: Duration::from_millis(5) }, 4)]
    #[case(AppError::from(ReplyDecodeError::UnknownKind("Maybe".to_owned())), 5)]
    #[case(AppError::from(ReplyDecodeError::EmptyData), 6)]
    #[case(AppError::Service("no volume is mounted at /mnt".to_owned()), 7)]
    #[case(AppError::InvalidOptions(MountOptionsError::NoDevices), 1)]
    #[case(AppError::Connect { endpoint: "tcp://127.0.0.1:1".to_owned(), source: io::Error::from(io::ErrorKind::ConnectionRefused) }, 2)]
    fn errors_map_to_documented_statuses(#[case] error: AppError, #[case] expected: u8) {
        assert_eq!(error.status(), expected);
    }

    #[test]
    fn empty_reply_decodes_as_lost_connection() {
        assert!(matches!(
            AppError::from(ReplyDecodeError::Empty),
            AppError::EmptyReply
        ));
    }
}
