//! Client sessions.
//!
//! A session is one control connection plus the datagram endpoint announced
//! in its handshake. The [`SessionCoordinator`] runs the command loop; the
//! server owns accepting, handshaking and worker limits.

pub mod coordinator;

pub use coordinator::{
    SessionCoordinator, SessionEnd, SessionSettings, BYE_COMMAND, DEFAULT_COMMAND_PACING,
    DEFAULT_IDLE_TIMEOUT, FAREWELL,
};

use std::io;
use std::time::Duration;

use protocol::ProtocolError;
use thiserror::Error;

use crate::files::SandboxError;

/// Errors that end a session before or during its command loop.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The client sent nothing within the handshake timeout.
    #[error("no handshake received within {} ms", .0.as_millis())]
    HandshakeTimeout(Duration),

    /// The connection closed before a handshake line arrived.
    #[error("connection closed before handshake")]
    HandshakeClosed,

    /// The handshake line was malformed or carried unusable parameters.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// The served root became unusable.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// Control or datagram channel I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<ProtocolError> for SessionError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidHandshake(reason) => SessionError::InvalidHandshake(reason),
            other => SessionError::InvalidHandshake(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_error_is_not_double_prefixed() {
        let err = SessionError::from(ProtocolError::InvalidHandshake(
            "client udp port must not be 0".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "Invalid handshake: client udp port must not be 0"
        );
    }
}
