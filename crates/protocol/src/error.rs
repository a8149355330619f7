//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering all wire-level failure modes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Failed to serialize data.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Failed to deserialize data.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// Descriptor datagram does not start with the expected magic bytes.
    #[error("invalid descriptor magic: expected {expected:#010x}, got {got:#010x}")]
    InvalidMagic {
        /// Expected magic value.
        expected: u32,
        /// Actual magic value received.
        got: u32,
    },

    /// Descriptor payload exceeds the maximum allowed size.
    #[error("descriptor too large: {size} bytes exceeds maximum of {max} bytes")]
    DescriptorTooLarge {
        /// Declared or actual payload size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// The handshake record is malformed or carries unusable parameters.
    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),

    /// A descriptor named something other than a bare file name.
    #[error("invalid file name in descriptor: {0:?}")]
    InvalidFileName(String),

    /// A checksum string is not a hex-encoded SHA-256 digest.
    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_eof() || err.is_syntax() {
            ProtocolError::Deserialization(err.to_string())
        } else {
            ProtocolError::Serialization(err.to_string())
        }
    }
}

impl From<rmp_serde::encode::Error> for ProtocolError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        ProtocolError::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for ProtocolError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        ProtocolError::Deserialization(err.to_string())
    }
}
