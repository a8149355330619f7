//! Client side of a transfer.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use protocol::{Checksum, FileDescriptor, ProtocolError};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::{digest_file, TransferError, TransferTimings, DATAGRAM_BUFFER_SIZE};

/// Progress notifications emitted while receiving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveEvent {
    /// The descriptor arrived and the destination file was created.
    Started { file_name: String, chunk_count: u64 },
    /// One payload datagram was written.
    ChunkReceived { index: u64, len: usize },
    /// The chunk stream ended; verification follows.
    Finished { chunks_received: u64 },
}

/// Summary of one verified receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveReport {
    /// Name from the descriptor.
    pub file_name: String,
    /// Where the file was written.
    pub path: PathBuf,
    /// Chunk count announced by the sender.
    pub declared_chunks: u64,
    /// Payload datagrams written.
    pub chunks_received: u64,
    /// Payload bytes written.
    pub bytes_received: u64,
    /// Verified digest.
    pub checksum: Checksum,
}

/// Receives files on a bound datagram socket into a download directory.
#[derive(Debug)]
pub struct FileReceiver {
    socket: UdpSocket,
    download_dir: PathBuf,
    descriptor_timeout: Duration,
    chunk_timeout: Duration,
}

impl FileReceiver {
    /// Bind a datagram socket for receiving.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        download_dir: impl Into<PathBuf>,
        timings: TransferTimings,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::new(socket, download_dir, timings))
    }

    /// Wrap an already bound socket.
    pub fn new(
        socket: UdpSocket,
        download_dir: impl Into<PathBuf>,
        timings: TransferTimings,
    ) -> Self {
        Self {
            socket,
            download_dir: download_dir.into(),
            descriptor_timeout: timings.descriptor_timeout,
            chunk_timeout: timings.chunk_timeout,
        }
    }

    /// Local address announced in the handshake.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Directory received files are written to.
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Receive one file.
    ///
    /// Waits for a descriptor, then writes datagrams in arrival order until
    /// the announced count is reached or a chunk wait times out, and finally
    /// verifies the written file against the announced checksum. The file is
    /// left in place even when verification fails.
    pub async fn receive<F>(&self, mut on_event: F) -> Result<ReceiveReport, TransferError>
    where
        F: FnMut(ReceiveEvent),
    {
        let mut buffer = vec![0u8; DATAGRAM_BUFFER_SIZE];

        let descriptor = self.await_descriptor(&mut buffer).await?;
        let expected = Checksum::from_hex(&descriptor.checksum)?;
        let path = self.download_dir.join(&descriptor.file_name);
        info!(
            file = %descriptor.file_name,
            chunks = descriptor.chunk_count,
            "Receiving file"
        );
        on_event(ReceiveEvent::Started {
            file_name: descriptor.file_name.clone(),
            chunk_count: descriptor.chunk_count,
        });

        let mut file = File::create(&path).await?;
        let mut chunks_received = 0u64;
        let mut bytes_received = 0u64;
        while chunks_received < descriptor.chunk_count {
            let next = timeout(self.chunk_timeout, self.socket.recv_from(&mut buffer)).await;
            let (n, _) = match next {
                Ok(result) => result?,
                Err(_) => {
                    debug!(
                        received = chunks_received,
                        expected = descriptor.chunk_count,
                        "Chunk wait timed out"
                    );
                    break;
                }
            };
            file.write_all(&buffer[..n]).await?;
            on_event(ReceiveEvent::ChunkReceived {
                index: chunks_received,
                len: n,
            });
            chunks_received += 1;
            bytes_received += n as u64;
        }
        file.flush().await?;
        drop(file);
        on_event(ReceiveEvent::Finished { chunks_received });

        let actual = digest_file(&path).await?;
        if actual != expected {
            warn!(
                file = %descriptor.file_name,
                expected = %expected,
                actual = %actual,
                "Checksum mismatch"
            );
            return Err(if chunks_received < descriptor.chunk_count {
                TransferError::Stalled {
                    file: descriptor.file_name,
                    received: chunks_received,
                    expected: descriptor.chunk_count,
                }
            } else {
                TransferError::ChecksumMismatch {
                    file: descriptor.file_name,
                    expected: expected.to_hex(),
                    actual: actual.to_hex(),
                }
            });
        }

        Ok(ReceiveReport {
            file_name: descriptor.file_name,
            path,
            declared_chunks: descriptor.chunk_count,
            chunks_received,
            bytes_received,
            checksum: actual,
        })
    }

    /// Wait for the next descriptor, skipping unrelated datagrams.
    async fn await_descriptor(&self, buffer: &mut [u8]) -> Result<FileDescriptor, TransferError> {
        let deadline = Instant::now() + self.descriptor_timeout;
        loop {
            let (n, from) = match timeout_at(deadline, self.socket.recv_from(buffer)).await {
                Ok(result) => result?,
                Err(_) => return Err(TransferError::DescriptorTimeout(self.descriptor_timeout)),
            };
            match FileDescriptor::decode(&buffer[..n]) {
                Ok(descriptor) => return Ok(descriptor),
                Err(err @ ProtocolError::InvalidFileName(_)) => return Err(err.into()),
                Err(err) => debug!(%from, len = n, error = %err, "Skipping stray datagram"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::files::PathSandbox;
    use crate::transfer::FileSender;

    fn timings() -> TransferTimings {
        TransferTimings {
            send_pacing: Duration::ZERO,
            descriptor_timeout: Duration::from_millis(500),
            chunk_timeout: Duration::from_millis(150),
        }
    }

    async fn receiver(dir: &Path) -> FileReceiver {
        FileReceiver::bind("127.0.0.1:0", dir, timings()).await.unwrap()
    }

    async fn raw_sender() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.unwrap()
    }

    #[tokio::test]
    async fn test_receive_from_file_sender() {
        let served = TempDir::new().unwrap();
        let downloads = TempDir::new().unwrap();
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 7 % 251) as u8).collect();
        std::fs::write(served.path().join("blob.bin"), &data).unwrap();
        let sandbox = PathSandbox::new(served.path()).unwrap();

        let receiver = receiver(downloads.path()).await;
        let sender = FileSender::new(
            Arc::new(raw_sender().await),
            receiver.local_addr().unwrap(),
            1024,
            Duration::from_millis(1),
        );

        let mut events = Vec::new();
        let (sent, received) = tokio::join!(
            sender.send_file(&sandbox, Path::new("blob.bin")),
            receiver.receive(|event| events.push(event)),
        );
        let sent = sent.unwrap();
        let received = received.unwrap();

        assert_eq!(received.file_name, "blob.bin");
        assert_eq!(received.declared_chunks, 10);
        assert_eq!(received.chunks_received, 10);
        assert_eq!(received.bytes_received, 10_000);
        assert_eq!(received.checksum, sent.checksum);
        assert_eq!(std::fs::read(&received.path).unwrap(), data);

        assert_eq!(
            events.first(),
            Some(&ReceiveEvent::Started {
                file_name: "blob.bin".to_string(),
                chunk_count: 10,
            })
        );
        assert_eq!(
            events.last(),
            Some(&ReceiveEvent::Finished {
                chunks_received: 10
            })
        );
    }

    #[tokio::test]
    async fn test_exact_multiple_verifies_after_missing_phantom_chunk() {
        let downloads = TempDir::new().unwrap();
        let receiver = receiver(downloads.path()).await;
        let target = receiver.local_addr().unwrap();
        let data = vec![42u8; 2048];

        let sender = raw_sender().await;
        let descriptor = FileDescriptor::new("even.bin", 3, Checksum::of(&data).to_hex());
        sender.send_to(&descriptor.encode().unwrap(), target).await.unwrap();
        sender.send_to(&data[..1024], target).await.unwrap();
        sender.send_to(&data[1024..], target).await.unwrap();

        let report = receiver.receive(|_| {}).await.unwrap();
        assert_eq!(report.chunks_received, 2);
        assert_eq!(report.declared_chunks, 3);
        assert_eq!(std::fs::read(&report.path).unwrap(), data);
    }

    #[tokio::test]
    async fn test_lost_chunk_is_reported_as_stall() {
        let downloads = TempDir::new().unwrap();
        let receiver = receiver(downloads.path()).await;
        let target = receiver.local_addr().unwrap();
        let data = vec![1u8; 3000];

        let sender = raw_sender().await;
        let descriptor = FileDescriptor::new("lossy.bin", 3, Checksum::of(&data).to_hex());
        sender.send_to(&descriptor.encode().unwrap(), target).await.unwrap();
        sender.send_to(&data[..1024], target).await.unwrap();

        let err = receiver.receive(|_| {}).await.unwrap_err();
        match err {
            TransferError::Stalled {
                file,
                received,
                expected,
            } => {
                assert_eq!(file, "lossy.bin");
                assert_eq!(received, 1);
                assert_eq!(expected, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // partial file stays on disk
        assert!(downloads.path().join("lossy.bin").exists());
    }

    #[tokio::test]
    async fn test_corrupted_payload_is_checksum_mismatch() {
        let downloads = TempDir::new().unwrap();
        let receiver = receiver(downloads.path()).await;
        let target = receiver.local_addr().unwrap();

        let sender = raw_sender().await;
        let descriptor = FileDescriptor::new("bad.bin", 2, Checksum::of(b"original").to_hex());
        sender.send_to(&descriptor.encode().unwrap(), target).await.unwrap();
        sender.send_to(b"tampered", target).await.unwrap();
        sender.send_to(b"!", target).await.unwrap();

        let err = receiver.receive(|_| {}).await.unwrap_err();
        assert!(matches!(err, TransferError::ChecksumMismatch { .. }));
        assert!(err.to_string().starts_with("Please try again. File corrupted: bad.bin"));
    }

    #[tokio::test]
    async fn test_descriptor_timeout() {
        let downloads = TempDir::new().unwrap();
        let receiver = receiver(downloads.path()).await;

        let err = receiver.receive(|_| {}).await.unwrap_err();
        assert!(matches!(err, TransferError::DescriptorTimeout(_)));
        assert_eq!(std::fs::read_dir(downloads.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_stray_datagrams_before_descriptor_are_skipped() {
        let downloads = TempDir::new().unwrap();
        let receiver = receiver(downloads.path()).await;
        let target = receiver.local_addr().unwrap();

        let sender = raw_sender().await;
        sender.send_to(b"leftover chunk", target).await.unwrap();
        let descriptor = FileDescriptor::new("small.txt", 1, Checksum::of(b"hi").to_hex());
        sender.send_to(&descriptor.encode().unwrap(), target).await.unwrap();
        sender.send_to(b"hi", target).await.unwrap();

        let report = receiver.receive(|_| {}).await.unwrap();
        assert_eq!(std::fs::read(&report.path).unwrap(), b"hi");
    }

    #[tokio::test]
    async fn test_empty_file() {
        let downloads = TempDir::new().unwrap();
        let receiver = receiver(downloads.path()).await;
        let target = receiver.local_addr().unwrap();

        let sender = raw_sender().await;
        let descriptor = FileDescriptor::new("empty", 1, Checksum::of(b"").to_hex());
        sender.send_to(&descriptor.encode().unwrap(), target).await.unwrap();

        let report = receiver.receive(|_| {}).await.unwrap();
        assert_eq!(report.chunks_received, 0);
        assert_eq!(std::fs::metadata(&report.path).unwrap().len(), 0);
    }
}
