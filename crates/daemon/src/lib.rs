//! # dgftp
//!
//! A small file server and interactive client. Clients browse a served
//! directory over a line-based TCP control channel and download files over
//! UDP.
//!
//! ## Overview
//!
//! - **Sandboxed browsing**: every session is confined to the served root
//! - **Datagram transfers**: one descriptor plus paced raw chunks, verified
//!   end to end with a whole-file checksum
//! - **Bounded concurrency**: a fixed number of sessions run at once
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────── FileServer ─────────────────────────────┐
//! │ accept ─▶ worker permit ─▶ handshake ─▶ SessionCoordinator          │
//! │                                         │                           │
//! │                    tokenize ─▶ CommandDispatcher                    │
//! │                                 │                │                  │
//! │                           PathSandbox        FileSender ══ UDP ══▶  │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                                   ClientSession
//!                                                   └ FileReceiver
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dgftp::server::{FileServer, ServerSettings};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = FileServer::bind(ServerSettings::new("/srv/files")).await?;
//!     server.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`control`]: Line I/O on the control channel
//! - [`files`]: Sandbox navigation and listings
//! - [`command`]: Tokenizing, parsing and dispatching commands
//! - [`transfer`]: Datagram sender and receiver
//! - [`session`]: Per-client command loop
//! - [`server`]: Listener and worker limit
//! - [`client`]: Interactive client session

pub mod client;
pub mod command;
pub mod config;
pub mod control;
pub mod files;
pub mod server;
pub mod session;
pub mod transfer;

// Re-export protocol for convenience
pub use protocol;

pub use client::{ClientError, ClientOptions, ClientSession, CommandOutcome};
pub use command::{Command, CommandDispatcher, CommandError};
pub use config::Config;
pub use files::{PathSandbox, SandboxError};
pub use server::{FileServer, ServerError, ServerSettings};
pub use session::{SessionCoordinator, SessionEnd, SessionError, SessionSettings};
pub use transfer::{
    FileReceiver, FileSender, ReceiveEvent, ReceiveReport, SendReport, TransferError,
    TransferTimings,
};
