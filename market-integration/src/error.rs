//! Errors produced by the protocol layer.

use crate::{Terminal, Unrecoverable};

/// Errors that can occur while establishing or driving a WebSocket/REST connection.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("connect timed out")]
    Timeout,

    #[error("http error, status: {0}")]
    HttpError(reqwest::StatusCode),

    #[error("failed to parse message: {0}")]
    ParseError(String),

    #[error("received message that could not be identified")]
    Unidentifiable,

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connection closed")]
    Closed,
}

impl Unrecoverable for SocketError {
    /// A closed or unidentifiable connection can be recovered from by reconnecting; a timeout
    /// or malformed-message error during the handshake is not worth retrying indefinitely.
    fn is_unrecoverable(&self) -> bool {
        matches!(self, SocketError::Unsupported(_))
    }
}

impl Terminal for SocketError {
    fn is_terminal(&self) -> bool {
        matches!(self, SocketError::Closed | SocketError::WebSocket(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_is_unrecoverable() {
        assert!(SocketError::Unsupported("bad op".into()).is_unrecoverable());
        assert!(!SocketError::Timeout.is_unrecoverable());
    }

    #[test]
    fn closed_is_terminal() {
        assert!(SocketError::Closed.is_terminal());
        assert!(!SocketError::Timeout.is_terminal());
    }
}
