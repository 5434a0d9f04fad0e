//! Dispatcher module exports.
//!
//! The dispatcher owns the per-connection control loop: registration, one
//! envelope at a time in arrival order, routing by kind, and the cleanup that
//! runs exactly once when the connection ends.

pub mod dispatcher;

pub use dispatcher::Dispatcher;
