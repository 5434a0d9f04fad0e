use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use duet_core::error::{DuetError, Result};
use duet_core::protocol::{self, reply, Inbound};

use crate::config::RelayConfig;
use crate::policy::{GuardDecision, InboundGuard};
use crate::realtime::{Broadcaster, Connection, Frame, RealtimeCore};
use crate::services::{ChatHistory, ChatService, PeerService, RoomService, SignalService};

/// Routes validated envelopes to the per-kind services and owns the
/// connection lifecycle (register -> loop -> cleanup).
pub struct Dispatcher {
    core: Arc<RealtimeCore>,
    cfg: RelayConfig,
    rooms: RoomService,
    chat: ChatService,
    signal: SignalService,
    peers: PeerService,
}

impl Dispatcher {
    pub fn new(core: Arc<RealtimeCore>, broadcaster: Broadcaster, cfg: RelayConfig) -> Self {
        let history = Arc::new(ChatHistory::new(cfg.chat.history_capacity));
        Self {
            rooms: RoomService::new(Arc::clone(&core), cfg.rooms.auto_join_creator),
            chat: ChatService::new(history, broadcaster, Arc::clone(&core.metrics)),
            signal: SignalService::new(Arc::clone(&core)),
            peers: PeerService::new(Arc::clone(&core)),
            core,
            cfg,
        }
    }

    pub fn core(&self) -> &RealtimeCore {
        &self.core
    }

    pub fn chat_history(&self) -> &ChatHistory {
        self.chat.history()
    }

    /// Register a new connection whose writer task drains `tx`.
    ///
    /// The relay assigns the id. `client-id` and the chat history are queued
    /// before the connection becomes visible to anyone else, so `client-id` is
    /// always the first frame the client sees. When the history is longer than
    /// the queue, only the most recent messages are replayed.
    pub fn open(&self, tx: mpsc::Sender<Frame>) -> Result<Arc<Connection>> {
        // the queue is empty here; keep one slot for `client-id`
        let room_for_history = tx.max_capacity().saturating_sub(1);
        let conn = Connection::new(Uuid::new_v4().to_string(), tx);

        let hello = Frame::try_from(reply::client_id(conn.id())?)?;
        self.core.gateway.deliver(&conn, &hello)?;

        // Replay and registration happen under the history lock, so every
        // chat is either in the replay or broadcast after registration.
        self.chat.history().replay_with(|history, through| {
            let skip = history.len().saturating_sub(room_for_history);
            for frame in history.iter().skip(skip) {
                if self.core.gateway.deliver(&conn, frame).is_err() {
                    break;
                }
            }
            conn.set_replayed_through(through);
            self.core.connections.add(Arc::clone(&conn));
        });
        self.core.metrics.record_connection();
        tracing::info!(
            conn = %conn.id(),
            total = self.core.connections.len(),
            "client registered"
        );
        Ok(conn)
    }

    /// Control loop: read, guard, decode, dispatch, strictly in arrival
    /// order. Ends when the inbound stream ends (close or transport error) or
    /// on shutdown, then runs cleanup.
    pub async fn run<S>(&self, conn: Arc<Connection>, mut inbound: S, shutdown: CancellationToken)
    where
        S: Stream<Item = String> + Unpin,
    {
        let mut guard = InboundGuard::from_config(&self.cfg);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::debug!("shutdown: closing connection loop");
                    break;
                }
                next = inbound.next() => {
                    let Some(text) = next else { break; };
                    self.handle_text(&conn, &mut guard, &text).await;
                }
            }
        }

        self.close(&conn);
    }

    /// One inbound text frame. Never fails: problems are replied to or logged.
    pub async fn handle_text(&self, conn: &Arc<Connection>, guard: &mut InboundGuard, text: &str) {
        if let GuardDecision::Drop(reason) = guard.check(text.len()) {
            self.core.metrics.record_drop(reason);
            tracing::debug!(reason, bytes = text.len(), "frame dropped by guard");
            return;
        }

        let result = match protocol::decode(text) {
            Ok(env) => {
                self.core.metrics.record_envelope(env.kind().as_str());
                self.dispatch(conn, env).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            self.report(conn, e);
        }
    }

    pub async fn dispatch(&self, conn: &Arc<Connection>, env: Inbound) -> Result<()> {
        match env {
            Inbound::CreateRoom => self.rooms.create(conn),
            Inbound::JoinRoom { room_id } => self.rooms.join(conn, &room_id),
            Inbound::LeaveRoom => self.rooms.leave(conn),
            Inbound::Chat { payload } => self.chat.publish(conn, &payload).await,
            Inbound::ListPeers => self.peers.list(conn),
            Inbound::Signal(signal) => self.signal.relay(conn, &signal),
        }
    }

    fn report(&self, conn: &Connection, err: DuetError) {
        if err.is_reported() {
            tracing::debug!(error = %err, "reporting to client");
            match reply::room_error(err.client_code()).and_then(Frame::try_from) {
                Ok(frame) => {
                    let _ = self.core.gateway.deliver(conn, &frame);
                }
                Err(e) => tracing::warn!(error = %e, "room-error encode failed"),
            }
            return;
        }

        let reason = match &err {
            DuetError::Malformed(_) => "malformed",
            DuetError::UnknownKind(_) => "unknown_kind",
            DuetError::MissingField { .. } => "missing_field",
            DuetError::ShuttingDown => "shutting_down",
            _ => "failed",
        };
        self.core.metrics.record_drop(reason);
        tracing::debug!(reason, error = %err, "envelope dropped");
    }

    /// Terminal cleanup, exactly once per connection: notify the room-mate,
    /// leave the room, then drop the registry entry.
    pub fn close(&self, conn: &Arc<Connection>) {
        if !conn.mark_closed() {
            return;
        }

        self.rooms.depart(conn);
        self.core.connections.remove_entry(conn);
        tracing::info!(
            conn = %conn.id(),
            total = self.core.connections.len(),
            "client disconnected"
        );
    }
}
