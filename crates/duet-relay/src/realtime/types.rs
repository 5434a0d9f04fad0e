use axum::extract::ws::Message;
use bytes::Bytes;

use duet_core::error::{DuetError, Result};

/// One serialized outbound envelope.
///
/// Encoded once, then shared by refcount across every recipient of a fan-out.
/// UTF-8 is checked at construction so the transport can always send it as a
/// text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Bytes);

impl Frame {
    pub fn new(bytes: Bytes) -> Result<Self> {
        std::str::from_utf8(&bytes)
            .map_err(|e| DuetError::Internal(format!("frame is not utf8: {e}")))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to axum::ws::Message for transport.
    /// NOTE: axum::Message::Text requires an owned String, so this copies.
    pub fn to_ws_message(&self) -> Message {
        Message::Text(self.as_str().to_owned())
    }
}

impl TryFrom<Bytes> for Frame {
    type Error = DuetError;

    fn try_from(bytes: Bytes) -> Result<Self> {
        Frame::new(bytes)
    }
}
