//! Server side of a transfer.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use protocol::{declared_chunk_count, Checksum, FileDescriptor};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::net::UdpSocket;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, trace};

use super::{digest_file, TransferError};
use crate::files::{PathSandbox, SandboxError};

/// Summary of one completed send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// Name announced in the descriptor.
    pub file_name: String,
    /// Chunk count announced in the descriptor.
    pub declared_chunks: u64,
    /// Payload datagrams actually sent.
    pub chunks_sent: u64,
    /// Payload bytes actually sent.
    pub bytes_sent: u64,
    /// Digest announced in the descriptor.
    pub checksum: Checksum,
}

/// Streams files to one client's datagram endpoint.
#[derive(Debug, Clone)]
pub struct FileSender {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    chunk_size: usize,
    pacing: Duration,
}

impl FileSender {
    /// Create a sender targeting `peer`.
    ///
    /// A zero `chunk_size` is treated as one byte.
    pub fn new(
        socket: Arc<UdpSocket>,
        peer: SocketAddr,
        chunk_size: usize,
        pacing: Duration,
    ) -> Self {
        Self {
            socket,
            peer,
            chunk_size: chunk_size.max(1),
            pacing,
        }
    }

    /// Datagram endpoint files are sent to.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Maximum payload per datagram.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Send the file at `path`, resolved through `sandbox`.
    ///
    /// Fails before anything hits the wire if the path does not name a
    /// regular file inside the sandbox.
    pub async fn send_file(
        &self,
        sandbox: &PathSandbox,
        path: &Path,
    ) -> Result<SendReport, TransferError> {
        let file_path = sandbox.get_file(path)?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| SandboxError::NotAFile(file_path.clone()))?;

        let size = tokio::fs::metadata(&file_path).await?.len();
        let checksum = digest_file(&file_path).await?;
        let declared_chunks = declared_chunk_count(size, self.chunk_size);
        let descriptor = FileDescriptor::new(file_name.clone(), declared_chunks, checksum.to_hex());
        let datagram = descriptor.encode()?;

        let mut file = File::open(&file_path).await?;
        let mut pacer = Pacer::new(self.pacing);

        pacer.wait().await;
        self.socket.send_to(&datagram, self.peer).await?;
        debug!(
            file = %file_name,
            size,
            chunks = declared_chunks,
            peer = %self.peer,
            "Descriptor sent"
        );

        let mut buffer = vec![0u8; self.chunk_size];
        let mut chunks_sent = 0u64;
        let mut bytes_sent = 0u64;
        loop {
            let n = read_chunk(&mut file, &mut buffer).await?;
            if n == 0 {
                break;
            }
            pacer.wait().await;
            self.socket.send_to(&buffer[..n], self.peer).await?;
            trace!(index = chunks_sent, len = n, "Chunk sent");
            chunks_sent += 1;
            bytes_sent += n as u64;
        }

        Ok(SendReport {
            file_name,
            declared_chunks,
            chunks_sent,
            bytes_sent,
            checksum,
        })
    }
}

/// Fixed-rate gate between datagrams. A zero period disables pacing.
struct Pacer(Option<Interval>);

impl Pacer {
    fn new(period: Duration) -> Self {
        if period.is_zero() {
            return Self(None);
        }
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self(Some(ticker))
    }

    async fn wait(&mut self) {
        if let Some(ticker) = self.0.as_mut() {
            ticker.tick().await;
        }
    }
}

/// Fill `buffer` from `file`, stopping early only at end of file.
async fn read_chunk(file: &mut File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = file.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
