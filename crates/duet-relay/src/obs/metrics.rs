//! Relay metrics registry.
//!
//! Labelled counters use a single static label value as key, so recording is
//! one `DashMap` lookup plus an atomic add and never allocates after the
//! first hit.

use std::fmt::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;

/// Counter family keyed by one label.
pub struct LabeledCounter {
    label: &'static str,
    map: DashMap<&'static str, AtomicU64>,
}

impl LabeledCounter {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            map: DashMap::new(),
        }
    }

    pub fn inc(&self, value: &'static str) {
        self.map
            .entry(value)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, value: &str) -> u64 {
        self.map
            .get(value)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        let mut rows: Vec<(&'static str, u64)> = self
            .map
            .iter()
            .map(|r| (*r.key(), r.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort_unstable();
        for (value, n) in rows {
            let _ = writeln!(out, "{name}{{{}=\"{value}\"}} {n}", self.label);
        }
    }
}

pub struct RelayMetrics {
    pub connections_opened: AtomicU64,
    pub envelopes: LabeledCounter,
    pub dropped: LabeledCounter,
    pub delivery_failures: AtomicU64,
    pub broadcasts: AtomicU64,
    draining: AtomicBool,
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self {
            connections_opened: AtomicU64::new(0),
            envelopes: LabeledCounter::new("kind"),
            dropped: LabeledCounter::new("reason"),
            delivery_failures: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            draining: AtomicBool::new(false),
        }
    }
}

impl RelayMetrics {
    pub fn record_connection(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_envelope(&self, kind: &'static str) {
        self.envelopes.inc(kind);
    }

    pub fn record_drop(&self, reason: &'static str) {
        self.dropped.inc(reason);
    }

    pub fn record_delivery_failure(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_failure_count(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    /// Mark draining state.
    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }

    /// Render everything plus caller-provided gauges (registry sizes).
    pub fn render(&self, gauges: &[(&str, u64)]) -> String {
        let mut out = String::new();
        let counter = |out: &mut String, name: &str, v: &AtomicU64| {
            let _ = writeln!(out, "# TYPE {name} counter\n{name} {}", v.load(Ordering::Relaxed));
        };

        counter(&mut out, "duet_connections_opened_total", &self.connections_opened);
        self.envelopes.render("duet_envelopes_total", &mut out);
        self.dropped.render("duet_envelopes_dropped_total", &mut out);
        counter(&mut out, "duet_delivery_failures_total", &self.delivery_failures);
        counter(&mut out, "duet_broadcasts_total", &self.broadcasts);

        let _ = writeln!(
            out,
            "# TYPE duet_draining gauge\nduet_draining {}",
            u8::from(self.is_draining())
        );
        for (name, v) in gauges {
            let _ = writeln!(out, "# TYPE {name} gauge\n{name} {v}");
        }
        out
    }
}
