//! Per-connection gateway session state.

use std::fmt;
use std::sync::Arc;

use backend_common::id::{prefix, prefixed_ulid};

use super::fanout::Outbound;

/// Opaque identity of one live WebSocket connection (`ws_` prefixed ULID).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(Arc<str>);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(prefixed_ulid(prefix::CONNECTION).into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}

/// State for a single WebSocket connection.
pub struct GatewaySession {
    pub connection_id: ConnectionId,
    /// Queue drained by the connection's write half; acks go through it too.
    pub outbound: Outbound,
}

impl GatewaySession {
    pub fn new(connection_id: ConnectionId, outbound: Outbound) -> Self {
        Self {
            connection_id,
            outbound,
        }
    }
}
