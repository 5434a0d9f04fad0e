//! Request/response room surface for clients that set up a room before
//! opening their WebSocket.

pub mod rooms;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use duet_core::error::DuetError;

/// HTTP face of a [`DuetError`].
#[derive(Debug)]
pub struct ApiError(pub DuetError);

impl From<DuetError> for ApiError {
    fn from(e: DuetError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            DuetError::RoomNotFound | DuetError::PeerNotFound(_) => StatusCode::NOT_FOUND,
            DuetError::RoomFull | DuetError::AlreadyInRoom(_) => StatusCode::CONFLICT,
            DuetError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            DuetError::Malformed(_)
            | DuetError::UnknownKind(_)
            | DuetError::MissingField { .. }
            | DuetError::InvalidPayload(_)
            | DuetError::BadRequest(_)
            | DuetError::UnsupportedVersion => StatusCode::BAD_REQUEST,
            DuetError::DeliveryFailed(_) | DuetError::ConnectionClosed | DuetError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "http request failed");
        }
        let body = Json(json!({ "error": self.0.client_code().as_str() }));
        (status, body).into_response()
    }
}
