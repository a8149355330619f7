//! Whole-file integrity digests.
//!
//! Transfers are verified after the fact: the sender digests the file before
//! streaming it and the receiver digests what it wrote. Digests travel as
//! lowercase hex strings inside the descriptor.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::error::{ProtocolError, Result};

/// Length of a digest in bytes.
pub const CHECKSUM_LENGTH: usize = 32;

/// A SHA-256 digest of a complete file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; CHECKSUM_LENGTH]);

impl Checksum {
    /// Digest a byte slice in one go.
    pub fn of(bytes: &[u8]) -> Self {
        let mut builder = ChecksumBuilder::new();
        builder.update(bytes);
        builder.finish()
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; CHECKSUM_LENGTH] {
        &self.0
    }

    /// Lowercase hex rendering used on the wire.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hex rendering produced by [`Checksum::to_hex`].
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| ProtocolError::InvalidChecksum(e.to_string()))?;
        let digest: [u8; CHECKSUM_LENGTH] = bytes.try_into().map_err(|b: Vec<u8>| {
            ProtocolError::InvalidChecksum(format!(
                "expected {} bytes, got {}",
                CHECKSUM_LENGTH,
                b.len()
            ))
        })?;
        Ok(Self(digest))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Checksum {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Incremental digest over a stream of chunks.
#[derive(Debug, Clone, Default)]
pub struct ChecksumBuilder {
    hasher: Sha256,
}

impl ChecksumBuilder {
    /// Start an empty digest.
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Feed the next run of bytes.
    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Finish and return the digest.
    pub fn finish(self) -> Checksum {
        Checksum(self.hasher.finalize().into())
    }
}
