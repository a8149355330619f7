//! File descriptor datagram.
//!
//! Every bulk transfer opens with one descriptor datagram followed by the raw
//! payload datagrams. The descriptor is the only self-delimited datagram on
//! the bulk channel; payload datagrams carry no header at all.
//!
//! # Datagram Format
//!
//! - 4 bytes: magic bytes "DGFD"
//! - 4 bytes: payload length (big-endian)
//! - N bytes: MessagePack-encoded [`FileDescriptor`]

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Magic bytes identifying a descriptor datagram.
pub const DESCRIPTOR_MAGIC: [u8; 4] = *b"DGFD";

/// Descriptor header size: 4 (magic) + 4 (length).
pub const DESCRIPTOR_HEADER_SIZE: usize = 8;

/// Maximum descriptor payload size (4 KiB).
pub const MAX_DESCRIPTOR_SIZE: usize = 4 * 1024;

/// Metadata announced ahead of a file's chunk stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Bare file name, never a path.
    pub file_name: String,
    /// Number of payload datagrams the receiver should wait for.
    pub chunk_count: u64,
    /// Hex-encoded checksum of the whole file.
    pub checksum: String,
}

impl FileDescriptor {
    /// Create a descriptor.
    pub fn new(
        file_name: impl Into<String>,
        chunk_count: u64,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            chunk_count,
            checksum: checksum.into(),
        }
    }

    /// Encode into a single datagram.
    pub fn encode(&self) -> Result<Vec<u8>> {
        validate_file_name(&self.file_name)?;

        let payload = rmp_serde::to_vec(self)?;
        if payload.len() > MAX_DESCRIPTOR_SIZE {
            return Err(ProtocolError::DescriptorTooLarge {
                size: payload.len(),
                max: MAX_DESCRIPTOR_SIZE,
            });
        }

        let mut output = Vec::with_capacity(DESCRIPTOR_HEADER_SIZE + payload.len());
        output.extend_from_slice(&DESCRIPTOR_MAGIC);
        output.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        output.extend_from_slice(&payload);
        Ok(output)
    }

    /// Decode a datagram produced by [`FileDescriptor::encode`].
    ///
    /// Trailing bytes after the declared payload are ignored.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < DESCRIPTOR_HEADER_SIZE {
            return Err(ProtocolError::Deserialization(format!(
                "insufficient data for descriptor header: need {} bytes, have {}",
                DESCRIPTOR_HEADER_SIZE,
                data.len()
            )));
        }

        let magic = [data[0], data[1], data[2], data[3]];
        if magic != DESCRIPTOR_MAGIC {
            return Err(ProtocolError::InvalidMagic {
                expected: u32::from_be_bytes(DESCRIPTOR_MAGIC),
                got: u32::from_be_bytes(magic),
            });
        }

        let length = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
        if length > MAX_DESCRIPTOR_SIZE {
            return Err(ProtocolError::DescriptorTooLarge {
                size: length,
                max: MAX_DESCRIPTOR_SIZE,
            });
        }

        let end = DESCRIPTOR_HEADER_SIZE + length;
        if data.len() < end {
            return Err(ProtocolError::Deserialization(format!(
                "insufficient data for descriptor: need {} bytes, have {}",
                end,
                data.len()
            )));
        }

        let descriptor: FileDescriptor = rmp_serde::from_slice(&data[DESCRIPTOR_HEADER_SIZE..end])?;
        validate_file_name(&descriptor.file_name)?;
        Ok(descriptor)
    }
}

/// Number of chunks announced for a file of `file_size` bytes.
///
/// This is `floor(file_size / chunk_size) + 1`, so an exact multiple of the
/// chunk size announces one chunk more than is ever sent. Receivers absorb
/// the phantom chunk through their per-chunk timeout. Changing the formula
/// breaks compatibility with deployed receivers.
pub fn declared_chunk_count(file_size: u64, chunk_size: usize) -> u64 {
    file_size / chunk_size.max(1) as u64 + 1
}

/// Reject anything that is not a bare file name on this platform.
///
/// `/` is always rejected. `\` is rejected only where it separates path
/// components, so a Unix file named `a\b` can still be sent; a Windows
/// receiver refuses its descriptor.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.chars().any(std::path::is_separator)
        || name.contains('\0')
    {
        return Err(ProtocolError::InvalidFileName(name.to_string()));
    }
    Ok(())
}
