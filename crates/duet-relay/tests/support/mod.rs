//! In-process relay harness: real dispatcher, broadcaster and registries,
//! with channels standing in for the socket halves.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use duet_relay::config::RelayConfig;
use duet_relay::dispatch::Dispatcher;
use duet_relay::realtime::{Broadcaster, Connection, Frame, RealtimeCore};

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Defaults with rate limiting off so bursts in tests are never dropped.
pub fn test_config() -> RelayConfig {
    let mut cfg = RelayConfig::default();
    cfg.limits.messages_per_sec = 0;
    cfg
}

pub struct Relay {
    pub core: Arc<RealtimeCore>,
    pub dispatcher: Arc<Dispatcher>,
    pub broadcaster: Broadcaster,
    pub shutdown: CancellationToken,
    pub broadcaster_task: JoinHandle<()>,
    outbound_queue: usize,
}

impl Relay {
    pub fn start(cfg: RelayConfig) -> Self {
        let core = Arc::new(RealtimeCore::new());
        let shutdown = CancellationToken::new();
        let (broadcaster, broadcaster_task) = Broadcaster::spawn(
            Arc::clone(&core.gateway),
            cfg.chat.broadcast_queue,
            shutdown.clone(),
        );
        let outbound_queue = cfg.relay.outbound_queue;
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&core),
            broadcaster.clone(),
            cfg,
        ));
        Self {
            core,
            dispatcher,
            broadcaster,
            shutdown,
            broadcaster_task,
            outbound_queue,
        }
    }

    /// Open a connection and consume its `client-id` frame.
    pub async fn connect(&self) -> Client {
        let mut client = self.connect_raw();
        let hello = client.recv().await;
        assert_eq!(hello["type"], "client-id");
        assert_eq!(hello["payload"]["id"], client.id.as_str());
        client
    }

    /// Open a connection without reading anything.
    pub fn connect_raw(&self) -> Client {
        let (out_tx, inbox) = mpsc::channel::<Frame>(self.outbound_queue);
        let conn = self.dispatcher.open(out_tx).expect("open");

        let (outbox, mut in_rx) = mpsc::unbounded_channel::<String>();
        let inbound = futures_util::stream::poll_fn(move |cx| in_rx.poll_recv(cx));

        let dispatcher = Arc::clone(&self.dispatcher);
        let shutdown = self.shutdown.clone();
        let loop_conn = Arc::clone(&conn);
        let task = tokio::spawn(async move {
            dispatcher.run(loop_conn, inbound, shutdown).await;
        });

        Client {
            id: conn.id().to_string(),
            conn,
            inbox,
            outbox: Some(outbox),
            task: Some(task),
        }
    }
}

pub struct Client {
    pub id: String,
    pub conn: Arc<Connection>,
    pub inbox: mpsc::Receiver<Frame>,
    outbox: Option<mpsc::UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
}

impl Client {
    pub fn send(&self, v: Value) {
        self.send_raw(&v.to_string());
    }

    /// Detached handle for feeding this connection from another task.
    pub fn sender(&self) -> mpsc::UnboundedSender<String> {
        self.outbox
            .as_ref()
            .expect("client already disconnected")
            .clone()
    }

    pub fn send_raw(&self, text: &str) {
        self.outbox
            .as_ref()
            .expect("client already disconnected")
            .send(text.to_string())
            .expect("connection loop gone");
    }

    pub async fn recv(&mut self) -> Value {
        let frame = tokio::time::timeout(RECV_TIMEOUT, self.inbox.recv())
            .await
            .unwrap_or_else(|_| panic!("{}: no frame within {RECV_TIMEOUT:?}", self.id))
            .expect("outbound queue closed");
        serde_json::from_str(frame.as_str()).expect("frame is JSON")
    }

    /// Nothing arrives within `ms`.
    pub async fn expect_silence(&mut self, ms: u64) {
        if let Ok(Some(frame)) =
            tokio::time::timeout(Duration::from_millis(ms), self.inbox.recv()).await
        {
            panic!("{}: unexpected frame {}", self.id, frame.as_str());
        }
    }

    /// End the inbound stream and wait for the connection loop to clean up.
    pub async fn disconnect(&mut self) {
        self.outbox.take();
        if let Some(task) = self.task.take() {
            task.await.expect("connection loop panicked");
        }
    }

    /// Wait for the connection loop to end on its own (shutdown).
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            task.await.expect("connection loop panicked");
        }
    }
}
