//! Shared error type across duet crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
///
/// The room codes are sent verbatim as `payload.error` of a `room-error`
/// envelope, so their strings must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Referenced room does not exist.
    RoomNotFound,
    /// Room already has two members.
    RoomFull,
    /// Payload present but unusable for the requested kind.
    InvalidPayload,
    /// Targeted relay to an id that is not connected.
    PeerNotFound,
    /// Malformed input outside the room surface.
    BadRequest,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::RoomNotFound => "Room not found",
            ClientCode::RoomFull => "Room is full",
            ClientCode::InvalidPayload => "Invalid payload",
            ClientCode::PeerNotFound => "Peer not found",
            ClientCode::BadRequest => "Bad request",
            ClientCode::Internal => "Internal error",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, DuetError>;

/// Unified error type used by core and relay.
#[derive(Debug, Error)]
pub enum DuetError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("unknown message type: {0}")]
    UnknownKind(String),
    #[error("{kind} requires '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("room not found")]
    RoomNotFound,
    #[error("room full")]
    RoomFull,
    #[error("already in room {0}")]
    AlreadyInRoom(String),
    #[error("peer not found: {0}")]
    PeerNotFound(String),
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("shutting down")]
    ShuttingDown,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl DuetError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            DuetError::RoomNotFound => ClientCode::RoomNotFound,
            DuetError::RoomFull => ClientCode::RoomFull,
            DuetError::InvalidPayload(_) => ClientCode::InvalidPayload,
            DuetError::PeerNotFound(_) => ClientCode::PeerNotFound,
            DuetError::Malformed(_)
            | DuetError::UnknownKind(_)
            | DuetError::MissingField { .. }
            | DuetError::AlreadyInRoom(_)
            | DuetError::BadRequest(_)
            | DuetError::UnsupportedVersion => ClientCode::BadRequest,
            DuetError::DeliveryFailed(_)
            | DuetError::ConnectionClosed
            | DuetError::ShuttingDown
            | DuetError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Whether the requester is told about this error with a `room-error`
    /// reply. Everything else is logged and dropped.
    pub fn is_reported(&self) -> bool {
        matches!(
            self,
            DuetError::RoomNotFound
                | DuetError::RoomFull
                | DuetError::InvalidPayload(_)
                | DuetError::PeerNotFound(_)
        )
    }
}
