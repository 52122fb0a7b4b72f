//! Wire error taxonomy.
//!
//! Every failure a client can see is written as a single line whose first
//! word names its class:
//!
//! ```text
//! ERROR <msg>          the protocol itself was misused (unknown verb)
//! CLIENT_ERROR <msg>   malformed command body or invalid queue name
//! SERVER_ERROR <msg>   the store failed while running a valid command
//! ```

use crate::queue::QueueError;
use std::fmt;
use thiserror::Error;

/// First word of an error reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Error,
    ClientError,
    ServerError,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Error => "ERROR",
            ErrorClass::ClientError => "CLIENT_ERROR",
            ErrorClass::ServerError => "SERVER_ERROR",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command failure that is reported to the client over the wire.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The verb is not one the server knows
    #[error("Unknown command")]
    UnknownCommand,

    /// Wrong number of tokens
    #[error("Invalid command")]
    InvalidCommand,

    /// `<bytes>` is not a non-negative integer
    #[error("Invalid <bytes> number")]
    InvalidDataSize,

    /// The data block did not end with `\r\n`
    #[error("bad data chunk")]
    BadDataChunk,

    /// The declared data block is larger than the configured limit
    #[error("object too large for cache")]
    ObjectTooLarge,

    /// The command was well formed but names an invalid queue
    #[error("{0}")]
    Client(String),

    /// The store failed
    #[error("{0}")]
    Server(String),
}

impl ProtocolError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ProtocolError::UnknownCommand => ErrorClass::Error,
            ProtocolError::Server(_) => ErrorClass::ServerError,
            _ => ErrorClass::ClientError,
        }
    }

    /// The full reply line, without the trailing CRLF.
    pub fn to_line(&self) -> String {
        format!("{} {}", self.class(), self)
    }
}

impl From<QueueError> for ProtocolError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::InvalidName
            | QueueError::NameTooLong
            | QueueError::NotFound(_)
            | QueueError::IdOutOfBounds(_)
            | QueueError::IsEmpty => ProtocolError::Client(err.to_string()),
            QueueError::Closed
            | QueueError::Full
            | QueueError::CorruptKey(_)
            | QueueError::MissingItem(_)
            | QueueError::Store(_) => ProtocolError::Server(err.to_string()),
        }
    }
}
