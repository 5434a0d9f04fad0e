//! Axum router wiring.

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::{api, app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    let rooms = Router::new()
        .route("/v1/rooms", post(api::rooms::create_room))
        .route("/v1/rooms/:id", get(api::rooms::room_status))
        .layer(room_cors());

    Router::new()
        .route("/v1/ws", get(transport::ws::ws_upgrade))
        .route("/ws", get(transport::ws::ws_upgrade))
        .merge(rooms)
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}

/// Browser clients call the room surface cross-origin before opening the socket.
fn room_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
