use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use duet_core::error::{DuetError, Result};

use crate::realtime::core::OutboundGateway;
use crate::realtime::types::Frame;

/// Handle to the single background fan-out task.
///
/// Each queued chat goes to every connection registered at delivery time
/// (not at enqueue time), except connections whose history replay already
/// covered its sequence number. Once the shutdown token fires nothing more is
/// accepted and whatever is still queued is discarded.
#[derive(Clone)]
pub struct Broadcaster {
    tx: mpsc::Sender<(u64, Frame)>,
    shutdown: CancellationToken,
}

/// A reserved place in the broadcast queue. Sending never waits.
pub struct BroadcastSlot<'a> {
    permit: mpsc::Permit<'a, (u64, Frame)>,
}

impl BroadcastSlot<'_> {
    pub fn send(self, seq: u64, frame: Frame) {
        self.permit.send((seq, frame));
    }
}

impl Broadcaster {
    pub fn spawn(
        gateway: Arc<OutboundGateway>,
        capacity: usize,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(run(gateway, rx, shutdown.clone()));
        (Self { tx, shutdown }, task)
    }

    /// Wait for room in the queue. `ShuttingDown` is the normal wind-down
    /// signal, not a failure.
    pub async fn reserve(&self) -> Result<BroadcastSlot<'_>> {
        if self.shutdown.is_cancelled() {
            return Err(DuetError::ShuttingDown);
        }
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(DuetError::ShuttingDown),
            permit = self.tx.reserve() => permit
                .map(|permit| BroadcastSlot { permit })
                .map_err(|_| DuetError::ShuttingDown),
        }
    }

    pub fn is_accepting(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.tx.is_closed()
    }
}

async fn run(gateway: Arc<OutboundGateway>, mut rx: mpsc::Receiver<(u64, Frame)>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = rx.recv() => {
                let Some((seq, frame)) = next else { break; };
                let delivered = gateway.send_to_all_after(seq, &frame);
                tracing::debug!(delivered, bytes = frame.len(), "broadcast");
            }
        }
    }

    rx.close();
    let mut discarded = 0usize;
    while rx.try_recv().is_ok() {
        discarded += 1;
    }
    tracing::info!(discarded, "broadcaster stopped");
}
