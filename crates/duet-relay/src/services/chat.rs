use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::value::RawValue;

use duet_core::error::Result;
use duet_core::protocol::reply;

use crate::obs::metrics::RelayMetrics;
use crate::realtime::{Broadcaster, Connection, Frame};

/// In-memory chat history ring (oldest first), replayed to new connections.
///
/// Every appended message gets the next sequence number, whether or not the
/// ring keeps it. A connection registered during replay records the last
/// sequence it was given, and the broadcaster skips anything at or below it.
pub struct ChatHistory {
    ring: Mutex<Ring>,
    capacity: usize,
}

struct Ring {
    frames: VecDeque<Frame>,
    last_seq: u64,
}

impl ChatHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring {
                frames: VecDeque::with_capacity(capacity.min(1024)),
                last_seq: 0,
            }),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `frame` and hand it to `publish` with its sequence number before
    /// the ring lock is released.
    pub fn append_with<R>(&self, frame: Frame, publish: impl FnOnce(u64, Frame) -> R) -> R {
        let mut ring = self.lock();
        ring.last_seq += 1;
        let seq = ring.last_seq;
        if self.capacity > 0 {
            if ring.frames.len() == self.capacity {
                ring.frames.pop_front();
            }
            ring.frames.push_back(frame.clone());
        }
        publish(seq, frame)
    }

    /// Run `register` with the retained frames and the last sequence number
    /// they cover. No message can be appended until it returns.
    pub fn replay_with<R>(&self, register: impl FnOnce(&VecDeque<Frame>, u64) -> R) -> R {
        let ring = self.lock();
        register(&ring.frames, ring.last_seq)
    }

    pub fn snapshot(&self) -> Vec<Frame> {
        self.lock().frames.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide chat: every connected client receives every message,
/// the sender included.
pub struct ChatService {
    history: Arc<ChatHistory>,
    broadcaster: Broadcaster,
    metrics: Arc<RelayMetrics>,
}

impl ChatService {
    pub fn new(history: Arc<ChatHistory>, broadcaster: Broadcaster, metrics: Arc<RelayMetrics>) -> Self {
        Self {
            history,
            broadcaster,
            metrics,
        }
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub async fn publish(&self, conn: &Connection, payload: &RawValue) -> Result<()> {
        let frame = Frame::try_from(reply::chat(conn.id(), payload)?)?;
        // a queue slot first, so a refused message never lands in history
        let slot = self.broadcaster.reserve().await?;
        self.history.append_with(frame, |seq, frame| slot.send(seq, frame));
        self.metrics.record_broadcast();
        Ok(())
    }
}
