//! Outbound envelopes (relay -> client).
//!
//! Every reply shares the inbound shape `{type, from?, to?, payload}`. Builders
//! serialize exactly once and hand back `Bytes`, so a broadcast clones a
//! refcount per recipient instead of re-encoding.

use bytes::Bytes;
use serde::Serialize;
use serde_json::value::RawValue;

use crate::error::{ClientCode, DuetError, Result};
use crate::protocol::envelope::SignalKind;

pub const CLIENT_ID: &str = "client-id";
pub const ROOM_CREATED: &str = "room-created";
pub const ROOM_JOINED: &str = "room-joined";
pub const ROOM_ERROR: &str = "room-error";
pub const PEER_JOINED: &str = "peer-joined";
pub const PEER_LEFT: &str = "peer-left";
pub const PEER_LIST: &str = "peer-list";
pub const CHAT: &str = "chat";

/// Generic outbound envelope.
#[derive(Debug, Serialize)]
pub struct OutboundEnvelope<'a, P> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<&'a str>,
    pub payload: P,
}

impl<'a, P: Serialize> OutboundEnvelope<'a, P> {
    pub fn new(kind: &'a str, payload: P) -> Self {
        Self {
            kind,
            from: None,
            to: None,
            payload,
        }
    }

    pub fn with_from(mut self, from: &'a str) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_to(mut self, to: &'a str) -> Self {
        self.to = Some(to);
        self
    }

    pub fn encode(&self) -> Result<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| DuetError::Internal(format!("encode {} failed: {e}", self.kind)))
    }
}

/// Room-management payload. Absent fields are omitted on the wire.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_peer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_count: Option<usize>,
}

#[derive(Debug, Serialize)]
struct IdPayload<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    error: &'static str,
}

#[derive(Debug, Serialize)]
struct PeerListPayload<'a> {
    peers: &'a [&'a str],
}

/// First envelope every connection receives: its relay-assigned id.
pub fn client_id(id: &str) -> Result<Bytes> {
    OutboundEnvelope::new(CLIENT_ID, IdPayload { id }).encode()
}

pub fn room_created(room_id: &str, peer_count: Option<usize>) -> Result<Bytes> {
    let info = RoomInfo {
        room_id: Some(room_id),
        peer_count,
        ..Default::default()
    };
    OutboundEnvelope::new(ROOM_CREATED, info).encode()
}

pub fn room_joined(
    room_id: &str,
    peer_id: &str,
    connected_peer: Option<&str>,
    peer_count: usize,
) -> Result<Bytes> {
    let info = RoomInfo {
        room_id: Some(room_id),
        peer_id: Some(peer_id),
        connected_peer,
        peer_count: Some(peer_count),
    };
    OutboundEnvelope::new(ROOM_JOINED, info).encode()
}

pub fn peer_joined(peer_id: &str, peer_count: usize) -> Result<Bytes> {
    peer_notice(PEER_JOINED, peer_id, peer_count)
}

pub fn peer_left(peer_id: &str, peer_count: usize) -> Result<Bytes> {
    peer_notice(PEER_LEFT, peer_id, peer_count)
}

fn peer_notice(kind: &'static str, peer_id: &str, peer_count: usize) -> Result<Bytes> {
    let info = RoomInfo {
        peer_id: Some(peer_id),
        peer_count: Some(peer_count),
        ..Default::default()
    };
    OutboundEnvelope::new(kind, info).encode()
}

pub fn room_error(code: ClientCode) -> Result<Bytes> {
    OutboundEnvelope::new(ROOM_ERROR, ErrorPayload {
        error: code.as_str(),
    })
    .encode()
}

pub fn peer_list(peers: &[&str]) -> Result<Bytes> {
    OutboundEnvelope::new(PEER_LIST, PeerListPayload { peers }).encode()
}

pub fn chat(from: &str, payload: &RawValue) -> Result<Bytes> {
    OutboundEnvelope::new(CHAT, payload).with_from(from).encode()
}

/// Targeted relay; the payload is forwarded verbatim.
pub fn signal(kind: SignalKind, from: &str, to: &str, payload: &RawValue) -> Result<Bytes> {
    OutboundEnvelope::new(kind.as_str(), payload)
        .with_from(from)
        .with_to(to)
        .encode()
}
