//! duet relay library entry.
//!
//! Wires transport, guard, dispatcher, realtime core, and the per-kind
//! services into one relay. Consumed by the binary (`main.rs`) and by
//! integration tests.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod api;
pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod realtime;
pub mod router;
pub mod services;
pub mod transport;
