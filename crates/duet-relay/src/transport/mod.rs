//! Transport layer (WebSocket).
//!
//! Turns an upgraded socket into what the dispatcher consumes: a stream of
//! inbound text frames plus one writer task that owns the sink.

pub mod codec;
pub mod ws;
