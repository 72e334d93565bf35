//! Error types for the editor bridge

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::connection::ConnectionState;

/// Result type alias using the bridge's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Transport-layer failures.
///
/// A command the editor received and rejected is *not* an error here: it comes
/// back as a decoded [`Response`](crate::Response) with `success == false`.
#[derive(Error, Debug)]
pub enum Error {
    /// The editor could not be reached or refused the handshake
    #[error("could not connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// No reply (or no turn on the channel) within the configured bound
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The channel broke in the middle of an exchange
    #[error("connection lost: {0}")]
    Transport(#[from] io::Error),

    /// A request was issued on a connection that is not ready
    #[error("connection is {0}, not ready")]
    NotReady(ConnectionState),

    /// The editor sent bytes that do not form a valid reply
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The dispatcher worker has stopped
    #[error("dispatcher is no longer running")]
    Unavailable,
}

/// Coarse failure classes reported to tool adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connect,
    Timeout,
    Transport,
    Protocol,
    Unavailable,
}

impl ErrorKind {
    /// The short label placed in a normalized response's `error` field
    pub fn label(self) -> &'static str {
        match self {
            Self::Connect => "connection failed",
            Self::Timeout => "timeout",
            Self::Transport => "transport error",
            Self::Protocol => "protocol error",
            Self::Unavailable => "dispatcher unavailable",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect { .. } => ErrorKind::Connect,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Transport(_) | Self::NotReady(_) => ErrorKind::Transport,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Unavailable => ErrorKind::Unavailable,
        }
    }

    /// Whether a fresh attempt on a new channel may succeed.
    ///
    /// Timeouts and protocol errors are excluded: the editor may already be
    /// executing the command, and running it twice could repeat a side effect.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Connect | ErrorKind::Transport)
    }

    pub(crate) fn connect(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}

/// Reply bytes that could not be understood
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The frame ended before a complete JSON value was read
    #[error("truncated frame")]
    Truncated,

    /// The frame is not valid JSON
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Valid JSON, but not a reply envelope
    #[error("unexpected reply shape: {0}")]
    UnexpectedShape(String),

    /// The reply grew past the configured frame limit
    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },

    /// The outgoing command could not be serialized
    #[error("could not encode command: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Configuration loading failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
