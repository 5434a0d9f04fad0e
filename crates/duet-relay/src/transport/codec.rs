//! Inbound frame classification.
//!
//! - Text frames (and UTF-8 binary frames) carry envelopes
//! - Ping/Pong are lifecycle only; the socket layer answers pings itself
//! - Close ends the connection

use axum::extract::ws::Message;

#[derive(Debug, PartialEq, Eq)]
pub enum Incoming {
    Text(String),
    Control,
    Close,
}

pub fn classify(msg: Message) -> Incoming {
    match msg {
        Message::Text(s) => Incoming::Text(s),
        Message::Binary(b) => match String::from_utf8(b) {
            Ok(s) => Incoming::Text(s),
            Err(_) => {
                tracing::debug!("non-utf8 binary frame ignored");
                Incoming::Control
            }
        },
        Message::Ping(_) | Message::Pong(_) => Incoming::Control,
        Message::Close(_) => Incoming::Close,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_utf8_is_treated_as_text() {
        let msg = Message::Binary(br#"{"type":"list-peers"}"#.to_vec());
        assert_eq!(classify(msg), Incoming::Text(r#"{"type":"list-peers"}"#.into()));
    }

    #[test]
    fn lifecycle_frames() {
        assert_eq!(classify(Message::Binary(vec![0xff, 0xfe])), Incoming::Control);
        assert_eq!(classify(Message::Ping(vec![1])), Incoming::Control);
        assert_eq!(classify(Message::Close(None)), Incoming::Close);
    }
}
