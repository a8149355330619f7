//! # dgftp Protocol Library
//!
//! Wire definitions shared by the dgftp server and client.
//!
//! ## Overview
//!
//! dgftp splits a session across two channels:
//!
//! - **Control channel** (TCP): one JSON handshake line, then plain text
//!   commands and responses, one per line.
//! - **Bulk channel** (UDP): per transfer, one descriptor datagram followed by
//!   raw payload datagrams. No acknowledgements, no retransmission.
//!
//! ```text
//! client                                   server
//!   │ ── {"id":..,"chunkSize":..} ──────────▶ │   handshake (TCP)
//!   │ ◀─────────── Session establishing: .. ─ │
//!   │ ── get notes.txt ─────────────────────▶ │
//!   │ ◀═══════════════ DGFD descriptor ══════ │   (UDP)
//!   │ ◀═══════════════ chunk 0 ══════════════ │
//!   │ ◀═══════════════ chunk n ══════════════ │
//!   │ ◀──────────────────────────────── /dir ─ │   prompt (TCP)
//! ```
//!
//! ## Modules
//!
//! - [`handshake`]: the session record sent on connect
//! - [`descriptor`]: the descriptor datagram and chunk accounting
//! - [`checksum`]: whole-file digests
//! - [`error`]: error types

pub mod checksum;
pub mod descriptor;
pub mod error;
pub mod handshake;

pub use checksum::{Checksum, ChecksumBuilder, CHECKSUM_LENGTH};
pub use descriptor::{
    declared_chunk_count, validate_file_name, FileDescriptor, DESCRIPTOR_HEADER_SIZE,
    DESCRIPTOR_MAGIC, MAX_DESCRIPTOR_SIZE,
};
pub use error::{ProtocolError, Result};
pub use handshake::{SessionInfo, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
