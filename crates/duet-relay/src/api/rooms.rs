use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use duet_core::error::DuetError;

use crate::api::ApiError;
use crate::app_state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRoom {
    pub room_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub room_id: String,
    pub peer_count: usize,
}

/// `POST /v1/rooms`: an empty room, joinable over the WebSocket by id.
pub async fn create_room(
    State(app): State<AppState>,
) -> Result<(StatusCode, Json<CreatedRoom>), ApiError> {
    if app.is_draining() {
        return Err(DuetError::ShuttingDown.into());
    }
    let room_id = app.realtime().rooms.create_room();
    tracing::info!(room = %room_id, "room created over http");
    Ok((
        StatusCode::CREATED,
        Json(CreatedRoom {
            room_id: room_id.to_string(),
        }),
    ))
}

/// `GET /v1/rooms/:id`
pub async fn room_status(
    State(app): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomStatus>, ApiError> {
    let realtime = app.realtime();
    let rooms = &realtime.rooms;
    if !rooms.room_exists(&room_id) {
        return Err(DuetError::RoomNotFound.into());
    }
    let peer_count = rooms.member_count(&room_id);
    Ok(Json(RoomStatus {
        room_id,
        peer_count,
    }))
}
