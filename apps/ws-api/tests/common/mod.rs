#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use ws_api::config::Config;
use ws_api::db::comments::MemoryCommentStore;
use ws_api::db::kv::{KeyValueStore, MemoryStore};
use ws_api::AppState;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Comment store with two known users.
pub fn seeded_store() -> Arc<MemoryCommentStore> {
    let store = Arc::new(MemoryCommentStore::new());
    store.insert_user("u1", "Ana", Some("https://cdn.example/ana.png"));
    store.insert_user("u2", "Ben", None);
    store
}

pub fn test_config() -> Config {
    Config {
        history_max_len: 20,
        history_default_limit: 10,
        ..Config::default()
    }
}

/// Build an AppState backed entirely by in-memory stores, with two known users.
pub fn test_state() -> (AppState, Arc<MemoryCommentStore>) {
    let store = seeded_store();
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    (AppState::new(test_config(), store.clone(), kv), store)
}

/// Build the full application router wired to the test state.
pub fn test_app() -> (Router, AppState, Arc<MemoryCommentStore>) {
    let (state, store) = test_state();
    let app = ws_api::routes::router().with_state(state.clone());
    (app, state, store)
}

/// Serve `state` on an ephemeral port in the background.
pub async fn serve(state: AppState) -> SocketAddr {
    let app = ws_api::routes::router().with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Start an actual TCP server for WebSocket testing. The server runs in the background.
pub async fn start_ws_server() -> (SocketAddr, AppState, Arc<MemoryCommentStore>) {
    let (state, store) = test_state();
    let addr = serve(state.clone()).await;
    (addr, state, store)
}

/// Open a WebSocket and consume the `connected` greeting. Returns the connection id.
pub async fn connect(addr: SocketAddr) -> (WsClient, String) {
    let url = format!("ws://{addr}/ws");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");

    let hello = recv_json(&mut ws).await;
    assert_eq!(hello["event"], "connected");
    let id = hello["data"]["id"].as_str().expect("connection id").to_string();
    (ws, id)
}

pub async fn send_json(ws: &mut WsClient, frame: Value) {
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .expect("ws send");
}

pub async fn send_event(ws: &mut WsClient, event: &str, data: Value) {
    send_json(ws, serde_json::json!({ "event": event, "data": data })).await;
}

pub async fn send_request(ws: &mut WsClient, event: &str, data: Value, ack: u64) {
    send_json(ws, serde_json::json!({ "event": event, "data": data, "ack": ack })).await;
}

/// Next text frame as JSON, skipping control frames.
pub async fn recv_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");

        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).expect("parse frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Read frames until the ack for `ack`. Returns the ack body and any events seen first.
pub async fn await_ack(ws: &mut WsClient, ack: u64) -> (Value, Vec<Value>) {
    let mut events = Vec::new();
    loop {
        let frame = recv_json(ws).await;
        if frame["ack"] == ack {
            return (frame["data"].clone(), events);
        }
        events.push(frame);
    }
}

/// Send a request and wait for its ack.
pub async fn request(ws: &mut WsClient, event: &str, data: Value, ack: u64) -> (Value, Vec<Value>) {
    send_request(ws, event, data, ack).await;
    await_ack(ws, ack).await
}

/// Round-trip an acknowledged request so every earlier frame on this connection is known
/// to be processed.
pub async fn sync(ws: &mut WsClient) -> Vec<Value> {
    let data = serde_json::json!({ "targetType": "location", "targetId": "__sync__" });
    let (reply, events) = request(ws, "comment:history", data, u64::MAX).await;
    assert_eq!(reply["ok"], true);
    events
}

pub async fn subscribe(ws: &mut WsClient, target_type: &str, target_id: &str) {
    send_event(
        ws,
        "comment:subscribe",
        serde_json::json!({ "targetType": target_type, "targetId": target_id }),
    )
    .await;
    sync(ws).await;
}

/// Assert nothing but control frames arrives within `window`.
pub async fn expect_silence(ws: &mut WsClient, window: Duration) {
    let deadline = time::Instant::now() + window;
    loop {
        match time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            Ok(other) => panic!("expected silence, got {other:?}"),
        }
    }
}
