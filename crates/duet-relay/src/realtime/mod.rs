//! Realtime runtime for the relay.
//!
//! Connection registry, room registry, the outbound gateway every write goes
//! through, and the broadcaster that fans chat out to everyone connected.

pub mod core;
pub mod types;

pub use self::core::{
    BroadcastSlot, Broadcaster, Connection, ConnectionRegistry, Departure, JoinOutcome, OutboundGateway,
    RealtimeCore, RoomRegistry, MAX_PEERS_PER_ROOM,
};
pub use types::Frame;
