//! Envelope codec.
//!
//! - `envelope`: inbound JSON text frames, decoded once and validated into a
//!   closed set of typed variants.
//! - `reply`: outbound envelopes, serialized once into bytes that can be fanned
//!   out to many connections without re-encoding.
//!
//! Parsers are panic-free: malformed input is reported as `DuetError` instead
//! of panicking, keeping the relay resilient to hostile traffic.

pub mod envelope;
pub mod reply;

pub use envelope::{decode, Inbound, Kind, Signal, SignalKind};
