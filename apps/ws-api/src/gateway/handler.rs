//! Inbound event dispatch for a single connection.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::CommentError;
use crate::AppState;

use super::ack::{AckReply, Reply};
use super::events::{
    ClientMessage, CreateCommentPayload, DeleteCommentPayload, EventName, HistoryPayload,
    RoomPayload, TypingPayload, UpdateCommentPayload,
};
use super::rooms::Target;
use super::session::GatewaySession;

/// Process one client frame to completion.
pub async fn handle_client_message(state: &AppState, session: &GatewaySession, msg: ClientMessage) {
    let ClientMessage { event, data, ack } = msg;

    match event.as_str() {
        EventName::SUBSCRIBE => handle_subscribe(state, session, data),
        EventName::UNSUBSCRIBE => handle_unsubscribe(state, session, data),
        EventName::TYPING => {
            if let Ok(payload) = serde_json::from_value::<TypingPayload>(data) {
                state.pipeline.typing(&session.connection_id, payload);
            }
        }
        EventName::CREATE => {
            let reply = reply_for(session, ack).await;
            respond(reply, async {
                let payload: CreateCommentPayload = decode(data)?;
                state.pipeline.create(&session.connection_id, payload).await?;
                Ok::<_, CommentError>(None)
            })
            .await;
        }
        EventName::UPDATE => {
            let reply = reply_for(session, ack).await;
            respond(reply, async {
                let payload: UpdateCommentPayload = decode(data)?;
                state.pipeline.update(payload).await?;
                Ok::<_, CommentError>(None)
            })
            .await;
        }
        EventName::DELETE => {
            let reply = reply_for(session, ack).await;
            respond(reply, async {
                let payload: DeleteCommentPayload = decode(data)?;
                state.pipeline.delete(payload).await?;
                Ok::<_, CommentError>(None)
            })
            .await;
        }
        EventName::HISTORY => {
            let reply = reply_for(session, ack).await;
            respond(reply, async {
                let payload: HistoryPayload = decode(data)?;
                let entries = state.pipeline.history(payload).await?;
                to_data(&entries).map(Some)
            })
            .await;
        }
        other => {
            tracing::debug!(
                connection_id = %session.connection_id,
                event = other,
                "ignoring unknown event"
            );
        }
    }
}

fn handle_subscribe(state: &AppState, session: &GatewaySession, data: Value) {
    let Some(target) = room_target(data) else {
        return;
    };
    let room = target.room_key();
    state.fanout.rooms().join(&session.connection_id, &room);
    tracing::debug!(connection_id = %session.connection_id, room = %room, "subscribed");
}

fn handle_unsubscribe(state: &AppState, session: &GatewaySession, data: Value) {
    let Some(target) = room_target(data) else {
        return;
    };
    let room = target.room_key();
    state.fanout.rooms().leave(&session.connection_id, &room);
    tracing::debug!(connection_id = %session.connection_id, room = %room, "unsubscribed");
}

/// Malformed subscribe / unsubscribe requests are dropped silently.
fn room_target(data: Value) -> Option<Target> {
    let payload: RoomPayload = serde_json::from_value(data).ok()?;
    Target::parse(payload.target_type.as_deref(), payload.target_id.as_deref())
}

async fn reply_for(session: &GatewaySession, ack: Option<u64>) -> Reply {
    Reply::reserve(session.connection_id.clone(), &session.outbound, ack).await
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T, CommentError> {
    serde_json::from_value(data).map_err(|_| CommentError::Validation)
}

fn to_data<T: Serialize>(value: &T) -> Result<Value, CommentError> {
    serde_json::to_value(value).map_err(|err| {
        tracing::error!(?err, "failed to serialize reply data");
        CommentError::Server
    })
}

/// Run one request and answer it exactly once. A panic inside the request is contained
/// here and answered with a server error.
async fn respond<F>(mut reply: Reply, request: F)
where
    F: Future<Output = Result<Option<Value>, CommentError>>,
{
    let outcome = match AssertUnwindSafe(request).catch_unwind().await {
        Ok(Ok(Some(data))) => AckReply::ok_with(data),
        Ok(Ok(None)) => AckReply::ok(),
        Ok(Err(err)) => AckReply::error(err),
        Err(_) => {
            tracing::error!("request handler panicked");
            AckReply::error(CommentError::Server)
        }
    };
    reply.send(outcome);
}
