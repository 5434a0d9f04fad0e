//! Real listener, raw HTTP/1.1 and a hand-rolled WebSocket client, so the
//! axum wiring (routes, upgrade, writer task) is covered end to end.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod support;

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use duet_relay::{app_state::AppState, router};
use support::test_config;

async fn start() -> (AppState, SocketAddr) {
    let state = AppState::new(test_config()).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router::build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (state, addr)
}

/// Write a raw request on a fresh connection and read the whole response.
async fn exchange(addr: SocketAddr, req: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut raw))
        .await
        .unwrap()
        .unwrap();
    String::from_utf8(raw).unwrap()
}

fn status_of(response: &str) -> u16 {
    response
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap()
}

/// Header value by case-insensitive name.
fn header<'a>(response: &'a str, name: &str) -> Option<&'a str> {
    let (head, _) = response.split_once("\r\n\r\n")?;
    head.lines().skip(1).find_map(|line| {
        let (k, v) = line.split_once(':')?;
        k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

/// One request on a fresh connection; returns (status, body).
async fn request(addr: SocketAddr, method: &str, path: &str) -> (u16, String) {
    let req = format!(
        "{method} {path} HTTP/1.1\r\nHost: relay\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    );
    let text = exchange(addr, &req).await;
    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_default();
    (status_of(&text), body)
}

#[tokio::test]
async fn ops_endpoints() {
    let (state, addr) = start().await;

    assert_eq!(request(addr, "GET", "/healthz").await, (200, "ok".into()));
    assert_eq!(request(addr, "GET", "/readyz").await, (200, "ready".into()));

    let (status, body) = request(addr, "GET", "/metrics").await;
    assert_eq!(status, 200);
    assert!(body.contains("duet_connections_active 0"));
    assert!(body.contains("duet_draining 0"));

    state.begin_drain();
    assert_eq!(request(addr, "GET", "/readyz").await, (503, "draining".into()));
    assert_eq!(request(addr, "GET", "/healthz").await.0, 200);
}

#[tokio::test]
async fn room_surface() {
    let (state, addr) = start().await;

    let (status, body) = request(addr, "POST", "/v1/rooms").await;
    assert_eq!(status, 201);
    let created: Value = serde_json::from_str(&body).unwrap();
    let room = created["roomId"].as_str().unwrap().to_string();

    let (status, body) = request(addr, "GET", &format!("/v1/rooms/{room}")).await;
    assert_eq!(status, 200);
    let status_body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(status_body, json!({ "roomId": room, "peerCount": 0 }));

    let (status, body) = request(addr, "GET", "/v1/rooms/nope").await;
    assert_eq!(status, 404);
    let err: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(err, json!({ "error": "Room not found" }));

    state.begin_drain();
    assert_eq!(request(addr, "POST", "/v1/rooms").await.0, 503);
}

#[tokio::test]
async fn room_surface_answers_cors_preflight() {
    let (_state, addr) = start().await;

    let preflight = exchange(
        addr,
        "OPTIONS /v1/rooms HTTP/1.1\r\nHost: relay\r\nOrigin: http://localhost:5173\r\n\
         Access-Control-Request-Method: POST\r\nAccess-Control-Request-Headers: content-type\r\n\
         Connection: close\r\n\r\n",
    )
    .await;
    assert_eq!(status_of(&preflight), 200);
    assert_eq!(header(&preflight, "access-control-allow-origin"), Some("*"));
    let methods = header(&preflight, "access-control-allow-methods").unwrap();
    assert!(methods.contains("POST"), "{methods}");
    assert!(methods.contains("GET"), "{methods}");
    let headers = header(&preflight, "access-control-allow-headers").unwrap();
    assert!(headers.eq_ignore_ascii_case("content-type"), "{headers}");

    let created = exchange(
        addr,
        "POST /v1/rooms HTTP/1.1\r\nHost: relay\r\nOrigin: http://localhost:5173\r\n\
         Content-Length: 0\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(status_of(&created), 201);
    assert_eq!(header(&created, "access-control-allow-origin"), Some("*"));
}

// --------------------
// Minimal WebSocket client
// --------------------
struct WsClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl WsClient {
    async fn connect(addr: SocketAddr, path: &str) -> Result<Self, u16> {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, mut writer) = stream.into_split();
        let req = format!(
            "GET {path} HTTP/1.1\r\nHost: relay\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n"
        );
        writer.write_all(req.as_bytes()).await.unwrap();

        let mut reader = BufReader::new(read);
        let mut status_line = String::new();
        reader.read_line(&mut status_line).await.unwrap();
        let status: u16 = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
        }
        if status != 101 {
            return Err(status);
        }
        Ok(Self { reader, writer })
    }

    async fn send(&mut self, v: Value) {
        let payload = v.to_string().into_bytes();
        let mask = [0x12u8, 0x34, 0x56, 0x78];
        let mut frame = vec![0x81u8];
        if payload.len() < 126 {
            frame.push(0x80 | payload.len() as u8);
        } else {
            frame.push(0x80 | 126);
            frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        frame.extend_from_slice(&mask);
        frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
        self.writer.write_all(&frame).await.unwrap();
    }

    /// Next text frame as JSON; control frames are skipped.
    async fn recv(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let mut head = [0u8; 2];
                self.reader.read_exact(&mut head).await.unwrap();
                let opcode = head[0] & 0x0f;
                let len = match head[1] & 0x7f {
                    126 => {
                        let mut ext = [0u8; 2];
                        self.reader.read_exact(&mut ext).await.unwrap();
                        u64::from(u16::from_be_bytes(ext))
                    }
                    127 => {
                        let mut ext = [0u8; 8];
                        self.reader.read_exact(&mut ext).await.unwrap();
                        u64::from_be_bytes(ext)
                    }
                    n => u64::from(n),
                };
                let mut payload = vec![0u8; len as usize];
                self.reader.read_exact(&mut payload).await.unwrap();
                if opcode == 0x1 {
                    return serde_json::from_slice(&payload).unwrap();
                }
            }
        })
        .await
        .expect("no frame in time")
    }
}

#[tokio::test]
async fn websocket_session_end_to_end() {
    let (state, addr) = start().await;

    let mut a = WsClient::connect(addr, "/v1/ws").await.unwrap();
    let hello = a.recv().await;
    assert_eq!(hello["type"], "client-id");
    let a_id = hello["payload"]["id"].as_str().unwrap().to_string();

    let mut b = WsClient::connect(addr, "/ws").await.unwrap();
    let b_id = b.recv().await["payload"]["id"].as_str().unwrap().to_string();

    a.send(json!({ "type": "create-room" })).await;
    let room = a.recv().await["payload"]["roomId"]
        .as_str()
        .unwrap()
        .to_string();
    b.send(json!({ "type": "join-room", "payload": { "roomId": room } }))
        .await;
    assert_eq!(b.recv().await["payload"]["connectedPeer"], a_id.as_str());
    assert_eq!(a.recv().await["type"], "peer-joined");

    a.send(json!({ "type": "offer", "to": b_id, "payload": { "sdp": "s".repeat(300) } }))
        .await;
    let offer = b.recv().await;
    assert_eq!(offer["from"], a_id.as_str());
    assert_eq!(offer["payload"]["sdp"].as_str().unwrap().len(), 300);

    assert_eq!(state.realtime().connections.len(), 2);

    drop(a);
    let left = b.recv().await;
    assert_eq!(left["type"], "peer-left");
    assert_eq!(left["payload"]["peerId"], a_id.as_str());
}

#[tokio::test]
async fn upgrade_is_refused_while_draining() {
    let (state, addr) = start().await;
    state.begin_drain();
    assert_eq!(WsClient::connect(addr, "/v1/ws").await.err(), Some(503));
}

#[tokio::test]
async fn drain_closes_live_sessions_within_grace() {
    let (state, addr) = start().await;
    let mut a = WsClient::connect(addr, "/v1/ws").await.unwrap();
    a.recv().await;

    state.begin_drain();
    assert!(state.wait_drained().await);
    assert!(state.realtime().connections.is_empty());
}
