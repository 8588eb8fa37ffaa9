//! WebSocket upgrade handler and per-connection tasks.
//!
//! Each connection runs a reader loop that handles client events one at a time and a writer
//! task that drains the outbound queue to the socket. The writer keeps delivering room
//! events while the reader waits on the store.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time;

use crate::AppState;

use super::events::{ClientMessage, ConnectedPayload, EventName};
use super::fanout::{event_frame, Frame};
use super::handler::handle_client_message;
use super::session::{ConnectionId, GatewaySession};

/// Consecutive silent intervals after which a connection is considered dead.
const MAX_MISSED_HEARTBEATS: u32 = 2;

pub const CLOSE_SESSION_TIMEOUT: u16 = 4009;

/// Pings and close frames from the reader to the writer.
const CONTROL_QUEUE_CAPACITY: usize = 4;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (ws_tx, ws_rx) = socket.split();

    let connection_id = ConnectionId::generate();
    let (outbound, outbound_rx) = state.fanout.connect(connection_id.clone());
    let session = GatewaySession::new(connection_id, outbound);

    tracing::info!(connection_id = %session.connection_id, "client connected");

    let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);
    let writer = tokio::spawn(write_loop(
        session.connection_id.clone(),
        ws_tx,
        outbound_rx,
        control_rx,
    ));

    // Nothing else can be queued yet: the connection has joined no room.
    let hello = ConnectedPayload {
        id: session.connection_id.to_string(),
    };
    let greeted = match event_frame(EventName::CONNECTED, &hello) {
        Some(frame) => session.outbound.send(frame).await.is_ok(),
        None => false,
    };

    if greeted {
        let heartbeat_interval = state.config.heartbeat_interval;
        read_loop(&state, &session, ws_rx, &control_tx, heartbeat_interval).await;
    }

    let rooms_left = state.fanout.disconnect(&session.connection_id);
    tracing::info!(
        connection_id = %session.connection_id,
        rooms_left,
        "client disconnected"
    );

    // Dropping the control sender stops the writer.
    drop(control_tx);
    if let Err(e) = writer.await {
        tracing::debug!(?e, connection_id = %session.connection_id, "writer task failed");
    }
}

/// Handle client events in order and enforce liveness.
async fn read_loop(
    state: &AppState,
    session: &GatewaySession,
    mut ws_rx: SplitStream<WebSocket>,
    control_tx: &mpsc::Sender<Message>,
    heartbeat_interval: Duration,
) {
    let mut heartbeat = time::interval(heartbeat_interval);
    heartbeat.tick().await; // First tick fires immediately; skip it.
    let mut missed_heartbeats = 0;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %session.connection_id, "ws read error");
                        break;
                    }
                    None => break,
                };
                missed_heartbeats = 0;

                match msg {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(text.as_str()) {
                            Ok(client_msg) => handle_client_message(state, session, client_msg).await,
                            Err(e) => {
                                tracing::debug!(
                                    ?e,
                                    connection_id = %session.connection_id,
                                    "ignoring malformed frame"
                                );
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => continue,
                }
            }

            _ = heartbeat.tick() => {
                missed_heartbeats += 1;
                if missed_heartbeats >= MAX_MISSED_HEARTBEATS {
                    tracing::debug!(
                        connection_id = %session.connection_id,
                        "heartbeat timeout, closing connection"
                    );
                    let _ = control_tx.send(close_message(CLOSE_SESSION_TIMEOUT, "Heartbeat timeout")).await;
                    break;
                }
                if control_tx.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Forward queued frames and control messages to the socket until either side goes away.
async fn write_loop(
    connection_id: ConnectionId,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Frame>,
    mut control_rx: mpsc::Receiver<Message>,
) {
    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else {
                    break;
                };
                if ws_tx.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }

            control = control_rx.recv() => {
                let Some(msg) = control else {
                    break;
                };
                let closing = matches!(msg, Message::Close(_));
                if ws_tx.send(msg).await.is_err() || closing {
                    break;
                }
            }
        }
    }

    tracing::debug!(connection_id = %connection_id, "writer stopped");
}

fn close_message(code: u16, reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }))
}
