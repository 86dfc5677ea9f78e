//! Error taxonomy for the capability client.
//!
//! Handshake failures (`HandshakeTimeout`, `HandshakeRejected`) are retried by
//! the connection supervisor and collapse into `ConnectionExhausted` once the
//! attempt budget is spent. `SessionInvalid` is what drives reconnection.

use std::time::Duration;
use thiserror::Error;

use crate::jsonrpc::JsonRpcError;

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced between the handshake and the typed tool facade.
///
/// `Clone` so that one handshake outcome can be handed to every caller that
/// was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// No endpoint announcement arrived on the event stream in time.
    #[error("Handshake timed out after {timeout:?} waiting for the endpoint announcement")]
    HandshakeTimeout {
        /// The timeout that was exceeded
        timeout: Duration,
    },

    /// The server answered the handshake, but not in a usable way.
    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    /// Every handshake attempt failed.
    #[error("Connection exhausted after {attempts} attempt(s): {last_error}")]
    ConnectionExhausted {
        /// How many handshakes were tried
        attempts: u32,
        /// Display form of the last attempt's failure
        last_error: String,
    },

    /// Network-level failure on an individual call or on the event stream.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server no longer recognizes the session id.
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    /// The server answered with a JSON-RPC error.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i32,
        /// Error message from the server
        message: String,
    },

    /// A single call did not receive its response in time.
    #[error("Request '{method}' (id {id}) timed out after {timeout:?}")]
    RequestTimeout {
        /// Method that was called
        method: String,
        /// Correlation id of the abandoned call
        id: u64,
        /// The timeout that was exceeded
        timeout: Duration,
    },

    /// A message could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The client was configured with unusable values.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The session was torn down while a call was waiting on it.
    #[error("Session closed: {0}")]
    Closed(String),
}

/// Coarse classification of an [`Error`], for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::HandshakeTimeout`]
    HandshakeTimeout,
    /// See [`Error::HandshakeRejected`]
    HandshakeRejected,
    /// See [`Error::ConnectionExhausted`]
    ConnectionExhausted,
    /// See [`Error::Transport`]
    Transport,
    /// See [`Error::SessionInvalid`]
    SessionInvalid,
    /// See [`Error::Rpc`]
    Rpc,
    /// See [`Error::RequestTimeout`]
    RequestTimeout,
    /// See [`Error::Serialization`]
    Serialization,
    /// See [`Error::Configuration`]
    Configuration,
    /// See [`Error::Closed`]
    Closed,
}

impl ErrorKind {
    /// Stable snake_case label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HandshakeTimeout => "handshake_timeout",
            Self::HandshakeRejected => "handshake_rejected",
            Self::ConnectionExhausted => "connection_exhausted",
            Self::Transport => "transport",
            Self::SessionInvalid => "session_invalid",
            Self::Rpc => "rpc",
            Self::RequestTimeout => "request_timeout",
            Self::Serialization => "serialization",
            Self::Configuration => "configuration",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HandshakeTimeout { .. } => ErrorKind::HandshakeTimeout,
            Self::HandshakeRejected(_) => ErrorKind::HandshakeRejected,
            Self::ConnectionExhausted { .. } => ErrorKind::ConnectionExhausted,
            Self::Transport(_) => ErrorKind::Transport,
            Self::SessionInvalid(_) => ErrorKind::SessionInvalid,
            Self::Rpc { .. } => ErrorKind::Rpc,
            Self::RequestTimeout { .. } => ErrorKind::RequestTimeout,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Closed(_) => ErrorKind::Closed,
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a handshake rejection
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::HandshakeRejected(message.into())
    }

    /// Create a session-invalid error
    pub fn session_invalid(message: impl Into<String>) -> Self {
        Self::SessionInvalid(message.into())
    }

    /// Classify a JSON-RPC error object returned by the server.
    pub fn from_rpc(error: &JsonRpcError) -> Self {
        if error.indicates_invalid_session() {
            Self::SessionInvalid(error.message.clone())
        } else {
            Self::Rpc {
                code: error.code,
                message: error.message.clone(),
            }
        }
    }

    /// Whether this failure means the session must be renegotiated.
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, Self::SessionInvalid(_))
    }

    /// Whether no session could be had at all, so any further call would
    /// only repeat the handshake.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionExhausted { .. } | Self::Closed(_) | Self::Configuration(_)
        )
    }

    /// Whether this failure happened while establishing a session.
    pub fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            Self::HandshakeTimeout { .. } | Self::HandshakeRejected(_) | Self::Transport(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
