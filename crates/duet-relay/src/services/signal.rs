use std::sync::Arc;

use duet_core::error::{DuetError, Result};
use duet_core::protocol::{reply, Signal};

use crate::realtime::{Connection, Frame, RealtimeCore};

/// Targeted relay for session negotiation. Exactly one recipient, never a
/// broadcast.
pub struct SignalService {
    core: Arc<RealtimeCore>,
}

impl SignalService {
    pub fn new(core: Arc<RealtimeCore>) -> Self {
        Self { core }
    }

    pub fn relay(&self, conn: &Connection, signal: &Signal) -> Result<()> {
        let target = self
            .core
            .connections
            .get(&signal.to)
            .ok_or_else(|| DuetError::PeerNotFound(signal.to.clone()))?;

        let frame = Frame::try_from(reply::signal(
            signal.kind,
            conn.id(),
            &signal.to,
            &signal.payload,
        )?)?;

        match self.core.gateway.deliver(&target, &frame) {
            Ok(()) => {
                tracing::debug!(kind = signal.kind.as_str(), to = %signal.to, "relayed");
                Ok(())
            }
            // Still registered but its writer is gone: cleanup is under way.
            Err(DuetError::ConnectionClosed) => Err(DuetError::PeerNotFound(signal.to.clone())),
            Err(e) => Err(e),
        }
    }
}
