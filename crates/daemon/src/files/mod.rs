//! Filesystem access for a session.
//!
//! This module provides:
//! - [`PathSandbox`]: navigation confined to the served root
//! - Listing rows and table rendering for `ls`
//!
//! # Security
//!
//! Paths are normalized lexically before classification, so `..` can never
//! walk above the root. Paths inside the root are additionally
//! canonicalized, which rejects symlinks that lead out of it.

pub mod listing;
pub mod sandbox;

pub use listing::{format_size, render_listing, EntryKind, ListingEntry};
pub use sandbox::{PathSandbox, SandboxError};
