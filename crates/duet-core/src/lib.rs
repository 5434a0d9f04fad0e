//! duet core: envelope codec and error surface for the signaling relay.
//!
//! This crate defines the wire-level contracts shared by the relay runtime and
//! its tests. It carries no transport or runtime dependencies so the codec can
//! be exercised (and reused by clients) without a socket.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed client
//! input must surface as `DuetError` so one hostile connection can never take
//! the relay down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ClientCode, DuetError, Result};
