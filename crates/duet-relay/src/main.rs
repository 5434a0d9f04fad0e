//! duet relay
//!
//! - WebSocket endpoint: /v1/ws (and /ws)
//! - Room surface: POST /v1/rooms, GET /v1/rooms/:id
//! - Ops: /healthz, /readyz, /metrics
//! - SIGINT/SIGTERM: drain, then exit within `shutdown_grace_ms`

use std::net::SocketAddr;
use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use duet_core::error::{DuetError, Result};
use duet_relay::{app_state::AppState, config, router};

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "relay failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve() -> Result<()> {
    let path = config::resolve_path();
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .relay
        .listen
        .parse()
        .map_err(|_| DuetError::BadRequest("relay.listen must be a valid SocketAddr".into()))?;

    let state = AppState::new(cfg)?;
    let app = router::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| DuetError::Internal(format!("bind {listen}: {e}")))?;
    tracing::info!(%listen, config = %path, "duet-relay starting");

    let stop = CancellationToken::new();
    let drain_state = state.clone();
    let drain_stop = stop.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        drain_state.begin_drain();
        drain_stop.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { stop.cancelled().await })
        .await
        .map_err(|e| DuetError::Internal(format!("server: {e}")))?;

    state.wait_drained().await;
    tracing::info!("duet-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
}
