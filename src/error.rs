//! Error types for imap-fetcher

use crate::controller::ConnectionState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad constructor input, reported before any I/O happens.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// The operation is not valid in the current connection state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Cannot open mailbox {path}: {reason}")]
    BoxOpen { path: String, reason: String },

    #[error("Fetch failed: {0}")]
    FetchProtocol(String),

    /// Malformed headers for one message. The batch it belongs to keeps
    /// going.
    #[error("Cannot parse message {uid}: {reason}")]
    MessageParse { uid: u32, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),
}

impl Error {
    /// Whether this error terminates the operation that produced it.
    ///
    /// Only per-message parse failures are recoverable.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::MessageParse { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
