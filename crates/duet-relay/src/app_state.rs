//! Shared application state for the relay.
//!
//! - Wire RealtimeCore + Broadcaster + Dispatcher from one validated config.
//! - Own the process-wide shutdown token and the tracker for connection tasks.
//! - Startup errors are explicit (Result instead of panic).

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use duet_core::error::Result;

use crate::config::RelayConfig;
use crate::dispatch::Dispatcher;
use crate::obs::metrics::RelayMetrics;
use crate::realtime::{Broadcaster, RealtimeCore};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    realtime: Arc<RealtimeCore>,
    dispatcher: Arc<Dispatcher>,
}

struct AppStateInner {
    cfg: RelayConfig,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    broadcaster_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    /// Build application state. Spawns the broadcaster, so it must run
    /// inside a tokio runtime.
    pub fn new(cfg: RelayConfig) -> Result<Self> {
        cfg.validate()?;

        let shutdown = CancellationToken::new();
        let realtime = Arc::new(RealtimeCore::new());
        let (broadcaster, broadcaster_task) = Broadcaster::spawn(
            Arc::clone(&realtime.gateway),
            cfg.chat.broadcast_queue,
            shutdown.clone(),
        );
        let dispatcher = Dispatcher::new(Arc::clone(&realtime), broadcaster, cfg.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                shutdown,
                tracker: TaskTracker::new(),
                broadcaster_task: Mutex::new(Some(broadcaster_task)),
            }),
            realtime,
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn cfg(&self) -> &RelayConfig {
        &self.inner.cfg
    }

    pub fn realtime(&self) -> Arc<RealtimeCore> {
        Arc::clone(&self.realtime)
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn metrics(&self) -> &RelayMetrics {
        &self.realtime.metrics
    }

    /// Registry sizes reported next to the counters.
    pub fn metrics_gauges(&self) -> [(&'static str, u64); 2] {
        [
            ("duet_connections_active", self.realtime.connections.len() as u64),
            ("duet_rooms_active", self.realtime.rooms.room_count() as u64),
        ]
    }

    pub fn shutdown(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    pub fn tracker(&self) -> TaskTracker {
        self.inner.tracker.clone()
    }

    pub fn is_draining(&self) -> bool {
        self.metrics().is_draining()
    }

    /// Flip readiness, stop the broadcaster and signal every connection loop.
    pub fn begin_drain(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.metrics().set_draining();
        self.inner.shutdown.cancel();
        tracing::info!(
            connections = self.realtime.connections.len(),
            "draining"
        );
    }

    /// Wait for connection tasks (bounded by `shutdown_grace_ms`) and the
    /// broadcaster task. Returns false when the grace period ran out.
    pub async fn wait_drained(&self) -> bool {
        let grace = Duration::from_millis(self.cfg().relay.shutdown_grace_ms);
        self.inner.tracker.close();
        let drained = tokio::time::timeout(grace, self.inner.tracker.wait())
            .await
            .is_ok();
        if !drained {
            tracing::warn!(
                remaining = self.inner.tracker.len(),
                "shutdown grace elapsed, forcing close"
            );
        }

        let task = self
            .inner
            .broadcaster_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "broadcaster task failed");
            }
        }
        drained
    }
}
