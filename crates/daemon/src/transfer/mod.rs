//! Chunked bulk transfers over the datagram channel.
//!
//! A transfer is one descriptor datagram followed by the file's bytes split
//! into datagrams of at most the negotiated chunk size. There is no
//! acknowledgement and no retransmission; the receiver verifies the whole
//! file against the descriptor's checksum once the stream ends.
//!
//! - [`FileSender`]: server side, triggered by `get`
//! - [`FileReceiver`]: client side, run right after issuing `get`

pub mod receiver;
pub mod sender;

use std::io;
use std::path::Path;
use std::time::Duration;

use protocol::{Checksum, ChecksumBuilder, ProtocolError};
use thiserror::Error;
use tokio::io::AsyncReadExt;

use crate::files::SandboxError;

pub use receiver::{FileReceiver, ReceiveEvent, ReceiveReport};
pub use sender::{FileSender, SendReport};

/// Default delay between consecutive datagrams.
pub const DEFAULT_SEND_PACING: Duration = Duration::from_millis(2);

/// Default wait for the descriptor datagram.
pub const DEFAULT_DESCRIPTOR_TIMEOUT: Duration = Duration::from_secs(3);

/// Default wait for each payload datagram once the descriptor arrived.
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(1);

/// Receive buffer size, large enough for any UDP payload.
pub const DATAGRAM_BUFFER_SIZE: usize = 64 * 1024;

/// Errors that can occur during a transfer.
///
/// Every variant ends the current attempt only; recovery is a fresh `get`.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The requested file could not be resolved.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// No descriptor arrived in time.
    #[error("no file descriptor received within {} ms", .0.as_millis())]
    DescriptorTimeout(Duration),

    /// Chunks stopped arriving and the partial file does not verify.
    #[error("Please try again. Transfer stalled after {received} of {expected} chunks: {file}")]
    Stalled {
        file: String,
        received: u64,
        expected: u64,
    },

    /// All announced chunks arrived but the file does not verify.
    #[error("Please try again. File corrupted: {file} (src: {expected}, dst: {actual})")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    /// IO error reading, writing, sending or receiving.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed descriptor.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Timing knobs for both transfer roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTimings {
    /// Delay between consecutive datagrams on the sending side.
    pub send_pacing: Duration,
    /// How long the receiver waits for the descriptor.
    pub descriptor_timeout: Duration,
    /// How long the receiver waits for each subsequent chunk.
    pub chunk_timeout: Duration,
}

impl Default for TransferTimings {
    fn default() -> Self {
        Self {
            send_pacing: DEFAULT_SEND_PACING,
            descriptor_timeout: DEFAULT_DESCRIPTOR_TIMEOUT,
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
        }
    }
}

/// Digest a file's full contents.
pub async fn digest_file(path: &Path) -> io::Result<Checksum> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut builder = ChecksumBuilder::new();
    let mut buffer = vec![0u8; DATAGRAM_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        builder.update(&buffer[..n]);
    }
    Ok(builder.finish())
}
