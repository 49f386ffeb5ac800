//! Connection error taxonomy

use std::io;

use linechat_protocol::{CodecError, DecodeError};
use linechat_utils::LinechatError;

/// TCP connect failed. Returned by [`Connection::open`](super::Connection::open).
#[derive(Debug, thiserror::Error)]
#[error("Failed to connect to {addr}: {source}")]
pub struct ConnectError {
    pub addr: String,
    #[source]
    pub source: io::Error,
}

/// Outgoing line could not be sent. Returned to the caller, never to the listener.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Connection is closed")]
    Closed,

    #[error("Outgoing text contains a newline")]
    EmbeddedNewline,

    #[error("Outgoing line exceeds maximum length of {max} bytes")]
    LineTooLong { max: usize },

    /// Write failed; the connection is closed as a result
    #[error("Write failed: {0}")]
    Io(#[from] io::Error),
}

/// Reported to [`Listener::on_exception`](super::Listener::on_exception).
///
/// [`ConnectionError::Decode`] is local to one line. Every other variant
/// ends the connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Failed to decode line: {0}")]
    Decode(#[from] DecodeError),

    #[error("Connection closed by peer")]
    Eof,

    #[error("Connection I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Incoming line exceeds maximum length of {max} bytes")]
    LineTooLong { max: usize },
}

impl ConnectionError {
    /// Whether this error terminates the connection
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }
}

impl From<CodecError> for ConnectionError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => Self::Io(e),
            CodecError::LineTooLong { max } => Self::LineTooLong { max },
        }
    }
}

impl From<ConnectError> for LinechatError {
    fn from(err: ConnectError) -> Self {
        LinechatError::connection(err.to_string())
    }
}

impl From<SendError> for LinechatError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Closed => LinechatError::ConnectionClosed,
            SendError::Io(e) => LinechatError::Io(e),
            other => LinechatError::protocol(other.to_string()),
        }
    }
}
