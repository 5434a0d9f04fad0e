use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use uuid::Uuid;

use duet_core::error::{DuetError, Result};

use super::connection_registry::Connection;

/// Hard cap on room membership.
pub const MAX_PEERS_PER_ROOM: usize = 2;

/// One pairing room. `members` is the room's own lock so rooms never
/// serialize against each other.
struct Room {
    id: Arc<str>,
    members: Mutex<Members>,
}

#[derive(Default)]
struct Members {
    conns: Vec<Arc<Connection>>,
    /// Set by the leave that empties the room. A closed room is already
    /// logically deleted even if a racing lookup still holds its `Arc`.
    closed: bool,
}

impl Room {
    fn lock(&self) -> MutexGuard<'_, Members> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closed(&self) -> bool {
        let members = self.lock();
        members.closed
    }

    fn snapshot(&self) -> Vec<Arc<Connection>> {
        let members = self.lock();
        members.conns.clone()
    }

    fn len(&self) -> usize {
        let members = self.lock();
        members.conns.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Member count after the join.
    pub peer_count: usize,
    /// The connection was already a member; nothing changed.
    pub already_member: bool,
}

/// Result of a leave that actually removed a membership.
#[derive(Debug)]
pub struct Departure {
    pub room_id: Arc<str>,
    pub remaining: Vec<Arc<Connection>>,
    pub room_deleted: bool,
}

/// Room registry: `room_id -> Room`.
///
/// State per room: Empty -> Active(1) -> Full(2), back down on departures.
/// The leave that empties a room deletes it before returning.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<Arc<str>, Arc<Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Resolve the room handle and release the map lock before touching
    /// membership.
    fn resolve(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.get(room_id).map(|r| Arc::clone(r.value()))
    }

    /// Create an empty room under a fresh id.
    pub fn create_room(&self) -> Arc<str> {
        let id: Arc<str> = Uuid::new_v4().to_string().into();
        let room = Arc::new(Room {
            id: Arc::clone(&id),
            members: Mutex::new(Members::default()),
        });
        self.rooms.insert(Arc::clone(&id), room);
        tracing::info!(room = %id, "room created");
        id
    }

    /// Add `conn` to `room_id` and stamp its room association.
    ///
    /// Rejoining a room the connection is already in is a no-op. A connection
    /// that belongs to a different room must leave it first.
    pub fn join_room(&self, room_id: &str, conn: &Arc<Connection>) -> Result<JoinOutcome> {
        if let Some(current) = conn.room() {
            if &*current != room_id {
                return Err(DuetError::AlreadyInRoom(current.to_string()));
            }
        }

        let room = self.resolve(room_id).ok_or(DuetError::RoomNotFound)?;
        let mut members = room.lock();

        if members.closed {
            return Err(DuetError::RoomNotFound);
        }
        if members.conns.iter().any(|c| c.id() == conn.id()) {
            return Ok(JoinOutcome {
                peer_count: members.conns.len(),
                already_member: true,
            });
        }
        if members.conns.len() >= MAX_PEERS_PER_ROOM {
            return Err(DuetError::RoomFull);
        }

        members.conns.push(Arc::clone(conn));
        conn.set_room(Some(Arc::clone(&room.id)));

        Ok(JoinOutcome {
            peer_count: members.conns.len(),
            already_member: false,
        })
    }

    /// Remove `conn` from its room and clear its association.
    ///
    /// Returns `None` when the connection had no room, so calling this twice
    /// in a row is harmless.
    pub fn leave_room(&self, conn: &Arc<Connection>) -> Option<Departure> {
        let room_id = conn.take_room()?;
        let room = self.resolve(&room_id)?;

        let (remaining, emptied) = {
            let mut members = room.lock();
            members.conns.retain(|c| c.id() != conn.id());
            if members.conns.is_empty() {
                members.closed = true;
            }
            (members.conns.clone(), members.closed)
        };

        if emptied {
            self.rooms.remove_if(&*room_id, |_, r| Arc::ptr_eq(r, &room));
            tracing::info!(room = %room_id, "room deleted");
        }

        Some(Departure {
            room_id,
            remaining,
            room_deleted: emptied,
        })
    }

    pub fn room_exists(&self, room_id: &str) -> bool {
        self.resolve(room_id).is_some_and(|room| !room.is_closed())
    }

    /// Members of `room_id`; empty when the room does not exist.
    pub fn members(&self, room_id: &str) -> Vec<Arc<Connection>> {
        self.resolve(room_id)
            .map(|room| room.snapshot())
            .unwrap_or_default()
    }

    pub fn member_count(&self, room_id: &str) -> usize {
        self.resolve(room_id)
            .map(|room| room.len())
            .unwrap_or(0)
    }

    /// Number of live rooms (including created-but-unjoined ones).
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
