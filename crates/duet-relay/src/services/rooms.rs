use std::sync::Arc;

use duet_core::error::{DuetError, Result};
use duet_core::protocol::reply;

use crate::realtime::{Connection, Frame, RealtimeCore, MAX_PEERS_PER_ROOM};

pub struct RoomService {
    core: Arc<RealtimeCore>,
    auto_join_creator: bool,
}

impl RoomService {
    pub fn new(core: Arc<RealtimeCore>, auto_join_creator: bool) -> Self {
        Self {
            core,
            auto_join_creator,
        }
    }

    /// create-room: new room, creator joined (when configured), reply to the
    /// creator only.
    pub fn create(&self, conn: &Arc<Connection>) -> Result<()> {
        self.leave(conn)?;

        let room_id = self.core.rooms.create_room();
        let peer_count = if self.auto_join_creator {
            Some(self.core.rooms.join_room(&room_id, conn)?.peer_count)
        } else {
            None
        };

        let frame = Frame::try_from(reply::room_created(&room_id, peer_count)?)?;
        self.core.gateway.deliver(conn, &frame)?;
        tracing::info!(room = %room_id, ?peer_count, "room created by client");
        Ok(())
    }

    /// join-room: reply to the joiner with the other member's id, then tell
    /// the other member.
    pub fn join(&self, conn: &Arc<Connection>, room_id: &str) -> Result<()> {
        if conn.room().as_deref() != Some(room_id) {
            // Check before giving up the current room so a failed join keeps it.
            if !self.core.rooms.room_exists(room_id) {
                return Err(DuetError::RoomNotFound);
            }
            if self.core.rooms.member_count(room_id) >= MAX_PEERS_PER_ROOM {
                return Err(DuetError::RoomFull);
            }
            self.leave(conn)?;
        }

        let outcome = self.core.rooms.join_room(room_id, conn)?;
        let members = self.core.rooms.members(room_id);
        let other = members.iter().find(|c| c.id() != conn.id()).map(|c| c.id());

        let frame = Frame::try_from(reply::room_joined(
            room_id,
            conn.id(),
            other,
            outcome.peer_count,
        )?)?;
        self.core.gateway.deliver(conn, &frame)?;

        if !outcome.already_member {
            let notice = Frame::try_from(reply::peer_joined(conn.id(), outcome.peer_count)?)?;
            self.core
                .gateway
                .send_to_room_except(room_id, conn.id(), &notice);
            tracing::info!(room = %room_id, peer_count = outcome.peer_count, "joined room");
        }
        Ok(())
    }

    /// leave-room: leave first, then tell whoever is left. No room, no-op.
    pub fn leave(&self, conn: &Arc<Connection>) -> Result<()> {
        let Some(departure) = self.core.rooms.leave_room(conn) else {
            return Ok(());
        };

        let notice = Frame::try_from(reply::peer_left(conn.id(), departure.remaining.len())?)?;
        for peer in &departure.remaining {
            let _ = self.core.gateway.deliver(peer, &notice);
        }
        tracing::info!(
            room = %departure.room_id,
            deleted = departure.room_deleted,
            "left room"
        );
        Ok(())
    }

    /// Disconnect path: the remaining member is told while the leaver is still
    /// a member, then membership is removed.
    pub fn depart(&self, conn: &Arc<Connection>) {
        if let Some(room_id) = conn.room() {
            let remaining = self.core.rooms.member_count(&room_id).saturating_sub(1);
            match reply::peer_left(conn.id(), remaining).and_then(Frame::try_from) {
                Ok(notice) => {
                    self.core
                        .gateway
                        .send_to_room_except(&room_id, conn.id(), &notice);
                }
                Err(e) => tracing::warn!(error = %e, "peer-left encode failed"),
            }
        }

        if let Some(departure) = self.core.rooms.leave_room(conn) {
            tracing::info!(
                room = %departure.room_id,
                deleted = departure.room_deleted,
                "left room on disconnect"
            );
        }
    }
}
