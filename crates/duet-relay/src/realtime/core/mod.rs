//! Realtime core components.
//!
//! Each registry owns its lock; callers only see the operations, never the
//! underlying maps.

mod broadcaster;
mod connection_registry;
mod gateway;
mod room_registry;

pub use broadcaster::{BroadcastSlot, Broadcaster};
pub use connection_registry::{Connection, ConnectionRegistry};
pub use gateway::{OutboundGateway, RealtimeCore};
pub use room_registry::{Departure, JoinOutcome, RoomRegistry, MAX_PEERS_PER_ROOM};
