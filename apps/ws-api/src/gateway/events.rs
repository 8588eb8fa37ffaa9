//! Gateway event names and wire-format messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::comment::{Comment, TargetType};
use crate::models::user::Author;

use super::rooms::Target;
use super::session::ConnectionId;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names exchanged with clients.
pub struct EventName;

impl EventName {
    pub const CONNECTED: &'static str = "connected";
    pub const SUBSCRIBE: &'static str = "comment:subscribe";
    pub const UNSUBSCRIBE: &'static str = "comment:unsubscribe";
    pub const CREATE: &'static str = "comment:create";
    pub const UPDATE: &'static str = "comment:update";
    pub const DELETE: &'static str = "comment:delete";
    pub const TYPING: &'static str = "comment:typing";
    pub const HISTORY: &'static str = "comment:history";
    pub const NEW: &'static str = "comment:new";
    pub const UPDATED: &'static str = "comment:updated";
    pub const DELETED: &'static str = "comment:deleted";
}

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// A message sent from the server to the client over WebSocket.
///
/// Either an event (`event` set) or an acknowledgment of an earlier request (`ack` set).
#[derive(Debug, Clone, Serialize)]
pub struct GatewayMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
    pub data: Value,
}

impl GatewayMessage {
    pub fn event(name: &str, data: Value) -> Self {
        Self {
            event: Some(name.to_string()),
            ack: None,
            data,
        }
    }

    pub fn ack(id: u64, data: Value) -> Self {
        Self {
            event: None,
            ack: Some(id),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Client → Server message
// ---------------------------------------------------------------------------

/// A message received from the client over WebSocket.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    /// Present when the client expects an acknowledgment.
    #[serde(default)]
    pub ack: Option<u64>,
}

// ---------------------------------------------------------------------------
// Inbound payloads
//
// Every field is optional so that missing fields surface as validation failures
// rather than decode errors.
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPayload {
    pub target_type: Option<String>,
    pub target_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentPayload {
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub user_id: Option<String>,
    pub content: Option<String>,
    pub parent_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommentPayload {
    pub id: Option<String>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub user_id: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCommentPayload {
    pub id: Option<String>,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPayload {
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Outbound payloads
// ---------------------------------------------------------------------------

/// Sent once, right after the upgrade.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedPayload {
    pub id: String,
}

/// Canonical payload for `comment:new` and `comment:updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    pub id: String,
    pub target_type: TargetType,
    pub target_id: String,
    pub user_id: String,
    pub content: String,
    pub parent_id: Option<String>,
    /// RFC 3339 with millisecond precision, UTC.
    pub created_at: String,
    /// Connection that created the comment; only set on `comment:new`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_id: Option<String>,
    pub user: Author,
}

impl CommentPayload {
    pub fn new(comment: &Comment, target: &Target, socket_id: Option<&ConnectionId>) -> Self {
        Self {
            id: comment.id.clone(),
            target_type: target.kind,
            target_id: target.id.clone(),
            user_id: comment.user_id.clone(),
            content: comment.content.clone(),
            parent_id: comment.parent_id.clone(),
            created_at: comment
                .created_at
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            socket_id: socket_id.map(|id| id.to_string()),
            user: comment.author.clone(),
        }
    }
}

/// Payload for `comment:deleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedPayload {
    pub id: String,
    pub target_type: TargetType,
    pub target_id: String,
}

/// Payload relayed for `comment:typing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingBroadcast {
    pub target_type: TargetType,
    pub target_id: String,
    pub user_id: String,
}
