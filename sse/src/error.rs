//! Error types for the `sse` crate.
//!
//! Follows the same pattern as the other layers: a root `Error` struct holding
//! an `error_kind` tree and an optional `source` for error chaining.
//!
//! None of these errors ever reach a publisher. A failed write is resolved
//! inside the broker by unregistering the subscriber it was addressed to.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the broker.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Transport(TransportErrorKind),
    Serialization,
    /// The frame cannot be written as SSE: a line break where only one line
    /// is allowed.
    InvalidFrame,
}

/// Reasons a single write to a subscriber's transport did not complete.
#[derive(Debug, PartialEq)]
pub enum TransportErrorKind {
    /// The receiving side of the connection is gone.
    Closed,
    /// The connection's outbound buffer is full; the client is not draining it.
    Full,
    /// The write did not finish within the configured bound.
    Timeout,
}

impl Error {
    pub fn transport(kind: TransportErrorKind) -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::Transport(kind),
        }
    }

    pub fn invalid_frame() -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::InvalidFrame,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Transport(TransportErrorKind::Closed) => write!(f, "transport closed"),
            ErrorKind::Transport(TransportErrorKind::Full) => write!(f, "transport buffer full"),
            ErrorKind::Transport(TransportErrorKind::Timeout) => write!(f, "transport write timed out"),
            ErrorKind::Serialization => write!(f, "failed to serialize event payload"),
            ErrorKind::InvalidFrame => write!(f, "frame contains a forbidden line break"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Serialization,
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Transport(TransportErrorKind::Timeout),
        }
    }
}
