//! Acknowledgment replies for mutation requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::OwnedPermit;

use crate::error::CommentError;

use super::events::GatewayMessage;
use super::fanout::{encode, Frame, Outbound};
use super::session::ConnectionId;

/// Body of an acknowledgment frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AckReply {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
            data: None,
        }
    }

    pub fn ok_with(data: Value) -> Self {
        Self {
            ok: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn error(err: CommentError) -> Self {
        Self {
            ok: false,
            error: Some(err.message().to_string()),
            data: None,
        }
    }
}

/// Single-use reply token for one request.
///
/// A request with an ack id holds a reserved slot in its connection's outbound queue, so a
/// busy room can never push the ack out. Only the first [`Reply::send`] reaches the client;
/// later calls are ignored. Requests without an ack id never produce a frame.
pub struct Reply {
    connection_id: ConnectionId,
    ack: Option<u64>,
    permit: Option<OwnedPermit<Frame>>,
    sent: bool,
}

impl Reply {
    /// Reserve room for the ack before the request runs. Waits while the queue is full; a
    /// closed queue leaves the reply with nowhere to go.
    pub async fn reserve(connection_id: ConnectionId, outbound: &Outbound, ack: Option<u64>) -> Self {
        let permit = match ack {
            Some(_) => outbound.clone().reserve_owned().await.ok(),
            None => None,
        };
        Self {
            connection_id,
            ack,
            permit,
            sent: false,
        }
    }

    pub fn send(&mut self, reply: AckReply) {
        if self.sent {
            return;
        }
        self.sent = true;

        let Some(ack) = self.ack else {
            return;
        };
        let Some(permit) = self.permit.take() else {
            tracing::debug!(connection_id = %self.connection_id, ack, "connection closed, ack dropped");
            return;
        };
        let data = match serde_json::to_value(&reply) {
            Ok(data) => data,
            Err(err) => {
                tracing::debug!(?err, "failed to serialize ack");
                return;
            }
        };
        if let Some(frame) = encode(&GatewayMessage::ack(ack, data)) {
            permit.send(frame);
        }
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        // A request that expected an answer always gets one.
        if !self.sent && self.ack.is_some() {
            tracing::warn!(connection_id = %self.connection_id, "request finished without a reply");
            self.send(AckReply::error(CommentError::Server));
        }
    }
}
