use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use duet_core::error::{DuetError, Result};

use crate::realtime::types::Frame;

/// One live client connection.
///
/// The only handle to the socket is `tx`: a bounded queue drained by the
/// connection's single writer task. Everything that wants to reach this client
/// (direct replies, relays, broadcasts) enqueues whole frames here, so two
/// writers can never interleave bytes on the wire.
#[derive(Debug)]
pub struct Connection {
    id: Arc<str>,
    tx: mpsc::Sender<Frame>,
    room: Mutex<Option<Arc<str>>>,
    closed: AtomicBool,
    /// Last chat sequence delivered by history replay.
    replayed_through: AtomicU64,
}

impl Connection {
    pub fn new(id: impl Into<Arc<str>>, tx: mpsc::Sender<Frame>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            tx,
            room: Mutex::new(None),
            closed: AtomicBool::new(false),
            replayed_through: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Room this connection currently belongs to, if any.
    pub fn room(&self) -> Option<Arc<str>> {
        self.room.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn set_room(&self, room: Option<Arc<str>>) {
        *self.room.lock().unwrap_or_else(PoisonError::into_inner) = room;
    }

    pub(crate) fn take_room(&self) -> Option<Arc<str>> {
        self.room.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn replayed_through(&self) -> u64 {
        self.replayed_through.load(Ordering::Acquire)
    }

    pub(crate) fn set_replayed_through(&self, seq: u64) {
        self.replayed_through.store(seq, Ordering::Release);
    }

    /// Enqueue one frame for the writer task. Never waits: a full queue means
    /// the client is not keeping up and the frame is reported as undelivered.
    pub fn send(&self, frame: Frame) -> Result<()> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DuetError::DeliveryFailed(format!("outbound queue full for {}", self.id)),
            TrySendError::Closed(_) => DuetError::ConnectionClosed,
        })
    }

    /// Writer side is gone (socket closed or errored).
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Flip to closed. Returns `true` only for the first caller, which owns cleanup.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }
}

/// Connection registry: `connection_id -> Connection`.
///
/// Lookups hand out `Arc<Connection>` clones so no shard lock is held while
/// the caller writes to the connection.
#[derive(Default)]
pub struct ConnectionRegistry {
    conns: DashMap<String, Arc<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            conns: DashMap::new(),
        }
    }

    /// Insert, replacing any stale entry with the same id.
    pub fn add(&self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        self.conns.insert(conn.id().to_string(), conn)
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Connection>> {
        self.conns.remove(id).map(|(_, conn)| conn)
    }

    /// Remove `conn` only if the entry under its id is this very connection.
    pub fn remove_entry(&self, conn: &Arc<Connection>) -> bool {
        self.conns
            .remove_if(conn.id(), |_, current| Arc::ptr_eq(current, conn))
            .is_some()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Connection>> {
        self.conns.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Snapshot of every registered connection, safe to iterate without locks.
    pub fn list(&self) -> Vec<Arc<Connection>> {
        self.conns.iter().map(|r| Arc::clone(r.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}
