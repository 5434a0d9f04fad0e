use std::sync::Arc;

use duet_core::error::Result;
use duet_core::protocol::reply;

use crate::realtime::{Connection, Frame, RealtimeCore};

pub struct PeerService {
    core: Arc<RealtimeCore>,
}

impl PeerService {
    pub fn new(core: Arc<RealtimeCore>) -> Self {
        Self { core }
    }

    /// Reply with every other connected id (process-wide, not room-scoped).
    pub fn list(&self, conn: &Connection) -> Result<()> {
        let all = self.core.connections.list();
        let peers: Vec<&str> = all
            .iter()
            .map(|c| c.id())
            .filter(|id| *id != conn.id())
            .collect();

        let frame = Frame::try_from(reply::peer_list(&peers)?)?;
        self.core.gateway.deliver(conn, &frame)
    }
}
