use std::sync::Arc;

use duet_core::error::{DuetError, Result};

use crate::obs::metrics::RelayMetrics;
use crate::realtime::core::{Connection, ConnectionRegistry, RoomRegistry};
use crate::realtime::types::Frame;

/// RealtimeCore: the shared registries plus the gateway that writes to them.
pub struct RealtimeCore {
    pub connections: Arc<ConnectionRegistry>,
    pub rooms: Arc<RoomRegistry>,
    pub gateway: Arc<OutboundGateway>,
    pub metrics: Arc<RelayMetrics>,
}

impl RealtimeCore {
    pub fn new() -> Self {
        let connections = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomRegistry::new());
        let metrics = Arc::new(RelayMetrics::default());
        let gateway = Arc::new(OutboundGateway::new(
            Arc::clone(&connections),
            Arc::clone(&rooms),
            Arc::clone(&metrics),
        ));
        Self {
            connections,
            rooms,
            gateway,
            metrics,
        }
    }
}

impl Default for RealtimeCore {
    fn default() -> Self {
        Self::new()
    }
}

/// Outbound gateway: the only path that writes to connections.
///
/// Registries are consulted to resolve recipients and every lock is released
/// before a frame is enqueued. Per-connection ordering and framing come from
/// the connection's single writer queue. A failed recipient is counted and
/// logged; multi-target sends always continue with the rest.
pub struct OutboundGateway {
    connections: Arc<ConnectionRegistry>,
    rooms: Arc<RoomRegistry>,
    metrics: Arc<RelayMetrics>,
}

impl OutboundGateway {
    pub fn new(
        connections: Arc<ConnectionRegistry>,
        rooms: Arc<RoomRegistry>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            connections,
            rooms,
            metrics,
        }
    }

    /// Write to a connection the caller already holds.
    pub fn deliver(&self, conn: &Connection, frame: &Frame) -> Result<()> {
        conn.send(frame.clone()).inspect_err(|e| {
            self.metrics.record_delivery_failure();
            tracing::warn!(conn = %conn.id(), error = %e, "delivery failed");
        })
    }

    pub fn send_to(&self, conn_id: &str, frame: &Frame) -> Result<()> {
        let conn = self
            .connections
            .get(conn_id)
            .ok_or_else(|| DuetError::PeerNotFound(conn_id.to_string()))?;
        self.deliver(&conn, frame)
    }

    /// Returns how many recipients accepted the frame.
    pub fn send_to_many(&self, conn_ids: &[&str], frame: &Frame) -> usize {
        conn_ids
            .iter()
            .filter(|id| self.send_to(id, frame).is_ok())
            .count()
    }

    pub fn send_to_room_except(&self, room_id: &str, exclude_id: &str, frame: &Frame) -> usize {
        let members = self.rooms.members(room_id);
        self.fan_out(members.iter().filter(|c| c.id() != exclude_id), frame)
    }

    pub fn send_to_all_except(&self, exclude_id: &str, frame: &Frame) -> usize {
        let all = self.connections.list();
        self.fan_out(all.iter().filter(|c| c.id() != exclude_id), frame)
    }

    /// Chat fan-out: skips connections whose history replay already carried
    /// message `seq`.
    pub fn send_to_all_after(&self, seq: u64, frame: &Frame) -> usize {
        let all = self.connections.list();
        self.fan_out(all.iter().filter(|c| c.replayed_through() < seq), frame)
    }

    fn fan_out<'a>(&self, targets: impl Iterator<Item = &'a Arc<Connection>>, frame: &Frame) -> usize {
        targets.filter(|c| self.deliver(c, frame).is_ok()).count()
    }
}
