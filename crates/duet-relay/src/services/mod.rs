//! Per-kind handlers the dispatcher routes validated envelopes to.
//!
//! - `rooms`: create/join/leave and the departure notices
//! - `chat`: process-wide chat with a bounded history
//! - `signal`: targeted offer/answer/ice-candidate relay
//! - `peers`: connected-peer listing

pub mod chat;
pub mod peers;
pub mod rooms;
pub mod signal;

pub use chat::{ChatHistory, ChatService};
pub use peers::PeerService;
pub use rooms::RoomService;
pub use signal::SignalService;
