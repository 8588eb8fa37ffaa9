//! Fan-out of gateway events to the connections in a room.
//!
//! Every live connection owns a bounded outbound queue drained by its socket task. A frame is
//! serialized once and the same buffer is handed to every recipient. Sending never waits:
//! a full queue drops the frame for that one connection instead of stalling the room.

use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::events::GatewayMessage;
use super::rooms::RoomRegistry;
use super::session::ConnectionId;

/// Frames a slow connection may have queued before further frames to it are dropped.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// A serialized text frame, cheap to clone.
pub type Frame = Utf8Bytes;

/// Sending half of a connection's outbound queue.
pub type Outbound = mpsc::Sender<Frame>;

/// Serialize a message into a frame.
pub fn encode(message: &GatewayMessage) -> Option<Frame> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Frame::from(json)),
        Err(err) => {
            tracing::error!(?err, "failed to serialize gateway message");
            None
        }
    }
}

/// Build an event frame from any serializable payload.
pub fn event_frame<T: Serialize>(event: &str, data: &T) -> Option<Frame> {
    match serde_json::to_value(data) {
        Ok(value) => encode(&GatewayMessage::event(event, value)),
        Err(err) => {
            tracing::error!(?err, event, "failed to serialize event payload");
            None
        }
    }
}

/// Push a frame onto one outbound queue without waiting. Returns whether it was queued.
pub fn try_deliver(outbound: &Outbound, connection_id: &ConnectionId, frame: Frame) -> bool {
    match outbound.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(
                connection_id = %connection_id,
                "outbound queue full, dropping frame"
            );
            false
        }
        // Connection is shutting down.
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Live connections and the rooms they belong to.
pub struct Fanout {
    connections: DashMap<ConnectionId, Outbound>,
    rooms: Arc<RoomRegistry>,
}

impl Fanout {
    pub fn new(rooms: Arc<RoomRegistry>) -> Self {
        Self {
            connections: DashMap::new(),
            rooms,
        }
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Register a connection and return the receiving half of its outbound queue.
    pub fn connect(&self, connection_id: ConnectionId) -> (Outbound, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        self.connections.insert(connection_id, tx.clone());
        (tx, rx)
    }

    /// Forget a connection and remove it from every room. Returns how many rooms it left.
    pub fn disconnect(&self, connection_id: &ConnectionId) -> usize {
        self.connections.remove(connection_id);
        self.rooms.leave_all(connection_id)
    }

    pub fn is_connected(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Deliver an event to every current member of `room`, the originator included.
    /// Returns the number of connections the frame was queued for.
    pub fn emit<T: Serialize>(&self, room: &str, event: &str, data: &T) -> usize {
        self.emit_filtered(room, event, data, None)
    }

    /// Deliver an event to every current member of `room` except `sender`.
    pub fn emit_except<T: Serialize>(
        &self,
        room: &str,
        event: &str,
        data: &T,
        sender: &ConnectionId,
    ) -> usize {
        self.emit_filtered(room, event, data, Some(sender))
    }

    fn emit_filtered<T: Serialize>(
        &self,
        room: &str,
        event: &str,
        data: &T,
        except: Option<&ConnectionId>,
    ) -> usize {
        let members = self.rooms.members(room);
        if members.is_empty() {
            return 0;
        }
        let Some(frame) = event_frame(event, data) else {
            return 0;
        };

        let mut delivered = 0;
        for member in members.iter().filter(|m| Some(*m) != except) {
            // Connections that went away mid-broadcast simply miss this frame.
            let Some(outbound) = self.connections.get(member).map(|tx| tx.clone()) else {
                continue;
            };
            if try_deliver(&outbound, member, frame.clone()) {
                delivered += 1;
            }
        }

        tracing::debug!(room, event, delivered, "event fanned out");
        delivered
    }
}
