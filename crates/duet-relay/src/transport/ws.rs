//! WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS (refused while draining)
//! - Split the socket: a writer task owns the sink, the dispatcher loop owns
//!   the stream
//! - Lifecycle: ping every `ping_interval_ms`, close after `idle_timeout_ms`
//!   without inbound traffic
//! - Tracing span per connection

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::app_state::AppState;
use crate::realtime::Frame;
use crate::transport::codec::{classify, Incoming};

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if app.is_draining() {
        return (StatusCode::SERVICE_UNAVAILABLE, "draining").into_response();
    }
    let tracker = app.tracker();
    ws.on_upgrade(move |socket| tracker.track_future(run_session(app, socket)))
}

// --------------------
// Session
// --------------------
async fn run_session(app: AppState, socket: WebSocket) {
    let relay = &app.cfg().relay;
    let outbound_queue = relay.outbound_queue;
    let ping_every = Duration::from_millis(relay.ping_interval_ms);
    let idle_timeout = Duration::from_millis(relay.idle_timeout_ms);

    let (out_tx, out_rx) = mpsc::channel::<Frame>(outbound_queue);
    let dispatcher = app.dispatcher();
    let conn = match dispatcher.open(out_tx) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(error = %e, "connection registration failed");
            return;
        }
    };
    let span = tracing::info_span!("conn", id = %conn.id());

    let (ws_tx, ws_rx) = socket.split();
    let stop = CancellationToken::new();
    let writer = tokio::spawn(
        write_loop(ws_tx, out_rx, ping_every, stop.clone()).instrument(span.clone()),
    );

    let inbound = inbound_stream(ws_rx, idle_timeout);
    dispatcher
        .run(conn, inbound, app.shutdown())
        .instrument(span)
        .await;

    stop.cancel();
    let _ = writer.await;
}

// --------------------
// Writer: the only code that touches the sink
// --------------------
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<Frame>,
    ping_every: Duration,
    stop: CancellationToken,
) {
    let mut ping_tick = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
    ping_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            next = out_rx.recv() => {
                let Some(frame) = next else { break; };
                if let Err(e) = sink.send(frame.to_ws_message()).await {
                    tracing::debug!(error = %e, "write failed");
                    return;
                }
            }
            _ = ping_tick.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    return;
                }
            }
        }
    }

    // flush what is already queued, then close
    out_rx.close();
    while let Ok(frame) = out_rx.try_recv() {
        if sink.send(frame.to_ws_message()).await.is_err() {
            return;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}

// --------------------
// Reader: text frames until close, error, or idle timeout
// --------------------
fn inbound_stream(
    rx: SplitStream<WebSocket>,
    idle_timeout: Duration,
) -> impl Stream<Item = String> + Unpin {
    Box::pin(futures_util::stream::unfold(rx, move |mut rx| async move {
        loop {
            let next = match tokio::time::timeout(idle_timeout, rx.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::info!("idle timeout");
                    return None;
                }
            };
            match next? {
                Ok(msg) => match classify(msg) {
                    Incoming::Text(s) => return Some((s, rx)),
                    Incoming::Control => continue,
                    Incoming::Close => return None,
                },
                Err(e) => {
                    tracing::debug!(error = %e, "read failed");
                    return None;
                }
            }
        }
    }))
}
