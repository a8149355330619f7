//! Control-channel listener.
//!
//! Accepts TCP connections, reads each client's handshake, binds a datagram
//! socket for the session and hands both to a [`SessionCoordinator`]. The
//! number of sessions running at once is capped; connections beyond the cap
//! wait, unanswered, until a worker frees up.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use protocol::SessionInfo;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::control::{read_line, write_line};
use crate::files::{PathSandbox, SandboxError};
use crate::session::{SessionCoordinator, SessionEnd, SessionError, SessionSettings};
use crate::transfer::{FileSender, DEFAULT_SEND_PACING};

/// Default control-channel port.
pub const DEFAULT_PORT: u16 = 2020;

/// Default time a new connection has to send its handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Sessions per CPU when the worker count is left to the server.
const WORKERS_PER_CPU: usize = 4;

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The served root is missing or not a directory.
    #[error("This is not a valid root path!")]
    InvalidRoot(#[source] SandboxError),

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Everything a server needs to run.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Control-channel listen address.
    pub bind_address: SocketAddr,
    /// Directory served to every session.
    pub root: PathBuf,
    /// Concurrent session cap; 0 sizes it from the CPU count.
    pub max_workers: usize,
    /// Time a new connection has to send its handshake.
    pub handshake_timeout: Duration,
    /// Delay between datagrams of a transfer.
    pub send_pacing: Duration,
    /// Command loop tuning.
    pub session: SessionSettings,
}

impl ServerSettings {
    /// Defaults for serving `root` on all interfaces.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            root: root.into(),
            max_workers: 0,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            send_pacing: DEFAULT_SEND_PACING,
            session: SessionSettings::default(),
        }
    }

    /// Effective concurrent session cap.
    pub fn worker_count(&self) -> usize {
        if self.max_workers > 0 {
            return self.max_workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            * WORKERS_PER_CPU
    }
}

/// A bound, not yet running, file server.
pub struct FileServer {
    listener: TcpListener,
    settings: Arc<ServerSettings>,
    workers: Arc<Semaphore>,
}

impl FileServer {
    /// Validate the root and bind the control listener.
    pub async fn bind(settings: ServerSettings) -> Result<Self, ServerError> {
        let sandbox = PathSandbox::new(&settings.root).map_err(ServerError::InvalidRoot)?;
        let listener = TcpListener::bind(settings.bind_address)
            .await
            .map_err(|source| ServerError::Bind {
                addr: settings.bind_address,
                source,
            })?;

        let worker_count = settings.worker_count();
        info!(
            "Serving {} on {} with {} workers",
            sandbox.root().display(),
            listener.local_addr()?,
            worker_count
        );

        Ok(Self {
            listener,
            settings: Arc::new(settings),
            workers: Arc::new(Semaphore::new(worker_count)),
        })
    }

    /// Address the control listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` is cancelled.
    ///
    /// Running sessions observe the same token and end at their next read.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Server received shutdown signal");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };
            debug!("Accepted connection from {}", peer);

            let workers = Arc::clone(&self.workers);
            let settings = Arc::clone(&self.settings);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let _permit = tokio::select! {
                    permit = workers.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                    _ = shutdown.cancelled() => return,
                };

                match serve_connection(stream, peer, &settings, shutdown).await {
                    Ok(end) => info!(%peer, ?end, "Session closed"),
                    Err(SessionError::Io(e)) => warn!(%peer, "Session I/O failed: {}", e),
                    Err(e) => error!(%peer, "Session failed: {}", e),
                }
            });
        }

        Ok(())
    }
}

/// Handshake, then run the command loop for one connection.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    settings: &ServerSettings,
    shutdown: CancellationToken,
) -> Result<SessionEnd, SessionError> {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let line = match timeout(settings.handshake_timeout, read_line(&mut reader)).await {
        Ok(line) => line?.ok_or(SessionError::HandshakeClosed)?,
        Err(_) => return Err(SessionError::HandshakeTimeout(settings.handshake_timeout)),
    };
    let info = match SessionInfo::from_json(&line) {
        Ok(info) => info,
        Err(e) => {
            let err = SessionError::from(e);
            write_line(&mut writer, &err.to_string()).await?;
            return Err(err);
        }
    };
    write_line(&mut writer, &info.acknowledgement()).await?;

    let endpoint = info.datagram_endpoint(peer.ip());
    let local = if endpoint.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = UdpSocket::bind(local).await?;
    let sender = FileSender::new(
        Arc::new(socket),
        endpoint,
        info.chunk_size,
        settings.send_pacing,
    );
    let sandbox = PathSandbox::new(&settings.root)?;

    let span = info_span!("session", session = %info.id, %peer);
    async move {
        info!(
            datagram_endpoint = %endpoint,
            chunk_size = info.chunk_size,
            "Session established"
        );
        let mut coordinator =
            SessionCoordinator::new(reader, writer, sandbox, sender, settings.session);
        coordinator.run(shutdown).await.map_err(SessionError::from)
    }
    .instrument(span)
    .await
}
