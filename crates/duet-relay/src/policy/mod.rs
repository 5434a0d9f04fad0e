//! Inbound policy (frame size + per-connection rate limit).
//!
//! Applied to raw text frames before decoding so oversized or flooding input
//! never reaches the codec.

pub mod engine;

pub use engine::{GuardDecision, InboundGuard};
