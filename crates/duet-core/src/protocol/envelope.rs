//! Inbound envelope (JSON text frame).
//!
//! Wire shape: `{"type": ..., "from": ..., "to": ..., "payload": ...}`.
//! `from` is never trusted (the relay stamps the sender itself) and unknown
//! fields are ignored. `payload` is kept as `RawValue` so signaling blobs are
//! relayed verbatim without a parse/re-encode round trip.

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::{DuetError, Result};

/// Every message kind a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    CreateRoom,
    JoinRoom,
    LeaveRoom,
    Chat,
    ListPeers,
    Offer,
    Answer,
    IceCandidate,
}

impl Kind {
    pub fn parse(s: &str) -> Option<Self> {
        let kind = match s {
            "create-room" => Kind::CreateRoom,
            "join-room" => Kind::JoinRoom,
            "leave-room" => Kind::LeaveRoom,
            "chat" => Kind::Chat,
            "list-peers" => Kind::ListPeers,
            "offer" => Kind::Offer,
            "answer" => Kind::Answer,
            "ice-candidate" => Kind::IceCandidate,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::CreateRoom => "create-room",
            Kind::JoinRoom => "join-room",
            Kind::LeaveRoom => "leave-room",
            Kind::Chat => "chat",
            Kind::ListPeers => "list-peers",
            Kind::Offer => "offer",
            Kind::Answer => "answer",
            Kind::IceCandidate => "ice-candidate",
        }
    }
}

/// Targeted-relay kinds (session negotiation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }
}

/// A validated targeted relay: exactly one recipient, non-empty payload.
#[derive(Debug)]
pub struct Signal {
    pub kind: SignalKind,
    pub to: String,
    pub payload: Box<RawValue>,
}

/// A validated inbound envelope.
#[derive(Debug)]
pub enum Inbound {
    CreateRoom,
    JoinRoom { room_id: String },
    LeaveRoom,
    Chat { payload: Box<RawValue> },
    ListPeers,
    Signal(Signal),
}

impl Inbound {
    pub fn kind(&self) -> Kind {
        match self {
            Inbound::CreateRoom => Kind::CreateRoom,
            Inbound::JoinRoom { .. } => Kind::JoinRoom,
            Inbound::LeaveRoom => Kind::LeaveRoom,
            Inbound::Chat { .. } => Kind::Chat,
            Inbound::ListPeers => Kind::ListPeers,
            Inbound::Signal(s) => match s.kind {
                SignalKind::Offer => Kind::Offer,
                SignalKind::Answer => Kind::Answer,
                SignalKind::IceCandidate => Kind::IceCandidate,
            },
        }
    }
}

/// Envelope as it appears on the wire, before validation.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    payload: Option<Box<RawValue>>,
}

#[derive(Debug, Deserialize)]
struct JoinTarget {
    #[serde(rename = "roomId")]
    room_id: String,
}

/// Decode and validate one text frame.
pub fn decode(text: &str) -> Result<Inbound> {
    let raw: RawEnvelope = serde_json::from_str(text)
        .map_err(|e| DuetError::Malformed(format!("invalid envelope json: {e}")))?;
    raw.validate()
}

impl RawEnvelope {
    fn validate(self) -> Result<Inbound> {
        let kind = Kind::parse(&self.kind).ok_or(DuetError::UnknownKind(self.kind))?;

        match kind {
            Kind::CreateRoom => Ok(Inbound::CreateRoom),
            Kind::LeaveRoom => Ok(Inbound::LeaveRoom),
            Kind::ListPeers => Ok(Inbound::ListPeers),
            Kind::JoinRoom => {
                let room_id = join_target(self.payload.as_deref())?;
                Ok(Inbound::JoinRoom { room_id })
            }
            Kind::Chat => {
                let payload = require_payload(kind, self.payload)?;
                Ok(Inbound::Chat { payload })
            }
            Kind::Offer | Kind::Answer | Kind::IceCandidate => {
                let to = self
                    .to
                    .filter(|t| !t.is_empty())
                    .ok_or(DuetError::MissingField {
                        kind: kind.as_str(),
                        field: "to",
                    })?;
                let payload = require_payload(kind, self.payload)?;
                let kind = match kind {
                    Kind::Offer => SignalKind::Offer,
                    Kind::Answer => SignalKind::Answer,
                    _ => SignalKind::IceCandidate,
                };
                Ok(Inbound::Signal(Signal { kind, to, payload }))
            }
        }
    }
}

fn join_target(payload: Option<&RawValue>) -> Result<String> {
    let raw = payload
        .ok_or_else(|| DuetError::InvalidPayload("join-room requires payload".into()))?;
    let target: JoinTarget = serde_json::from_str(raw.get())
        .map_err(|e| DuetError::InvalidPayload(format!("join-room payload: {e}")))?;
    if target.room_id.is_empty() {
        return Err(DuetError::InvalidPayload("join-room roomId is empty".into()));
    }
    Ok(target.room_id)
}

fn require_payload(kind: Kind, payload: Option<Box<RawValue>>) -> Result<Box<RawValue>> {
    payload
        .filter(|p| !is_empty_payload(p))
        .ok_or(DuetError::MissingField {
            kind: kind.as_str(),
            field: "payload",
        })
}

/// `null`, `""`, `{}` and `[]` (whitespace-insensitive) carry nothing to relay.
fn is_empty_payload(raw: &RawValue) -> bool {
    let s = raw.get();
    if s.len() > 16 {
        return false;
    }
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    matches!(compact.as_str(), "null" | "\"\"" | "{}" | "[]")
}
