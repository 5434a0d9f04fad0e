//! Lightweight in-process metrics.
//!
//! Counters are plain atomics rendered in Prometheus text format by the
//! `/metrics` handler; gauges that mirror registry sizes are read at render
//! time instead of being tracked.

pub mod metrics;
