//! Comment mutation pipeline: validate, authorize, persist, broadcast, record.

use std::sync::Arc;

use crate::db::comments::CommentStore;
use crate::error::CommentError;
use crate::models::comment::{Comment, NewComment};

use super::events::{
    CommentPayload, CreateCommentPayload, DeleteCommentPayload, DeletedPayload, EventName,
    HistoryPayload, TypingBroadcast, TypingPayload, UpdateCommentPayload,
};
use super::fanout::Fanout;
use super::history::RecentHistory;
use super::rooms::{non_empty, Target};
use super::session::ConnectionId;

pub struct CommentPipeline {
    store: Arc<dyn CommentStore>,
    fanout: Arc<Fanout>,
    history: RecentHistory,
    history_limit: usize,
}

/// Trimmed content, or `None` if nothing is left.
fn trimmed_content(content: Option<&str>) -> Option<String> {
    content
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

impl CommentPipeline {
    pub fn new(
        store: Arc<dyn CommentStore>,
        fanout: Arc<Fanout>,
        history: RecentHistory,
        history_limit: usize,
    ) -> Self {
        Self {
            store,
            fanout,
            history,
            history_limit,
        }
    }

    pub async fn create(
        &self,
        connection_id: &ConnectionId,
        payload: CreateCommentPayload,
    ) -> Result<CommentPayload, CommentError> {
        let target = Target::parse(payload.target_type.as_deref(), payload.target_id.as_deref())
            .ok_or(CommentError::Validation)?;
        let user_id = non_empty(payload.user_id.as_deref()).ok_or(CommentError::Validation)?;
        let content = trimmed_content(payload.content.as_deref()).ok_or(CommentError::Validation)?;

        let comment = self
            .store
            .create(NewComment {
                target_type: target.kind,
                target_id: target.id.clone(),
                user_id: user_id.to_string(),
                content,
                parent_id: payload.parent_id.filter(|p| !p.is_empty()),
            })
            .await?;

        let room = target.room_key();
        let broadcast = CommentPayload::new(&comment, &target, Some(connection_id));
        self.fanout.emit(&room, EventName::NEW, &broadcast);
        self.history.record(&room, &broadcast);

        tracing::debug!(comment_id = %comment.id, room = %room, "comment created");
        Ok(broadcast)
    }

    pub async fn update(
        &self,
        payload: UpdateCommentPayload,
    ) -> Result<CommentPayload, CommentError> {
        let id = non_empty(payload.id.as_deref()).ok_or(CommentError::Validation)?;
        let target = Target::parse(payload.target_type.as_deref(), payload.target_id.as_deref())
            .ok_or(CommentError::Validation)?;
        let user_id = non_empty(payload.user_id.as_deref()).ok_or(CommentError::Validation)?;
        let content = trimmed_content(payload.content.as_deref()).ok_or(CommentError::Validation)?;

        self.authorize(id, user_id).await?;

        let comment = self
            .store
            .update_content(id, &content)
            .await?
            .ok_or(CommentError::Forbidden)?;

        let room = target.room_key();
        let broadcast = CommentPayload::new(&comment, &target, None);
        self.fanout.emit(&room, EventName::UPDATED, &broadcast);
        self.history.record(&room, &broadcast);

        tracing::debug!(comment_id = %comment.id, room = %room, "comment updated");
        Ok(broadcast)
    }

    pub async fn delete(
        &self,
        payload: DeleteCommentPayload,
    ) -> Result<DeletedPayload, CommentError> {
        let id = non_empty(payload.id.as_deref()).ok_or(CommentError::Validation)?;
        let target = Target::parse(payload.target_type.as_deref(), payload.target_id.as_deref())
            .ok_or(CommentError::Validation)?;
        let user_id = non_empty(payload.user_id.as_deref()).ok_or(CommentError::Validation)?;

        self.authorize(id, user_id).await?;

        if !self.store.delete(id).await? {
            return Err(CommentError::Forbidden);
        }

        let room = target.room_key();
        let broadcast = DeletedPayload {
            id: id.to_string(),
            target_type: target.kind,
            target_id: target.id,
        };
        self.fanout.emit(&room, EventName::DELETED, &broadcast);

        tracing::debug!(comment_id = %id, room = %room, "comment deleted");
        Ok(broadcast)
    }

    /// Relay a typing indicator to the rest of the room. Returns `false` for malformed input,
    /// which is dropped without a reply.
    pub fn typing(&self, connection_id: &ConnectionId, payload: TypingPayload) -> bool {
        let Some(target) =
            Target::parse(payload.target_type.as_deref(), payload.target_id.as_deref())
        else {
            return false;
        };
        let Some(user_id) = non_empty(payload.user_id.as_deref()) else {
            return false;
        };

        let room = target.room_key();
        let broadcast = TypingBroadcast {
            target_type: target.kind,
            target_id: target.id,
            user_id: user_id.to_string(),
        };
        self.fanout
            .emit_except(&room, EventName::TYPING, &broadcast, connection_id);
        true
    }

    /// Most recent comments broadcast to a room, newest first.
    pub async fn history(
        &self,
        payload: HistoryPayload,
    ) -> Result<Vec<CommentPayload>, CommentError> {
        let target = Target::parse(payload.target_type.as_deref(), payload.target_id.as_deref())
            .ok_or(CommentError::Validation)?;
        let limit = payload
            .limit
            .unwrap_or(self.history_limit)
            .min(self.history_limit);

        Ok(self.history.recent(&target.room_key(), limit).await?)
    }

    /// The comment must exist and belong to `user_id`.
    async fn authorize(&self, id: &str, user_id: &str) -> Result<Comment, CommentError> {
        match self.store.find(id).await? {
            Some(comment) if comment.user_id == user_id => Ok(comment),
            Some(_) => {
                tracing::debug!(comment_id = %id, user_id, "not the comment owner");
                Err(CommentError::Forbidden)
            }
            None => Err(CommentError::Forbidden),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::db::kv::MemoryStore;
    use crate::error::StoreError;
    use crate::gateway::fanout::Frame;
    use crate::gateway::rooms::RoomRegistry;

    const ROOM: &str = "comment:location:loc1";

    struct Harness {
        pipeline: CommentPipeline,
        store: Arc<crate::db::comments::MemoryCommentStore>,
        fanout: Arc<Fanout>,
    }

    fn harness() -> Harness {
        let store = Arc::new(crate::db::comments::MemoryCommentStore::new());
        store.insert_user("u1", "Ana", Some("https://cdn/ana.png"));
        store.insert_user("u2", "Ben", None);
        let fanout = Arc::new(Fanout::new(Arc::new(RoomRegistry::new())));
        let history = RecentHistory::new(Arc::new(MemoryStore::new()), 10);
        let pipeline = CommentPipeline::new(store.clone(), fanout.clone(), history, 5);
        Harness {
            pipeline,
            store,
            fanout,
        }
    }

    fn subscribe(fanout: &Fanout, id: &str, room: &str) -> mpsc::Receiver<Frame> {
        let connection_id = ConnectionId::from(id);
        let (_, rx) = fanout.connect(connection_id.clone());
        fanout.rooms().join(&connection_id, room);
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str(frame.as_str()).unwrap());
        }
        frames
    }

    fn create_payload(user_id: &str, content: &str) -> CreateCommentPayload {
        CreateCommentPayload {
            target_type: Some("location".to_string()),
            target_id: Some("loc1".to_string()),
            user_id: Some(user_id.to_string()),
            content: Some(content.to_string()),
            parent_id: None,
        }
    }

    async fn seed(h: &Harness) -> String {
        h.pipeline
            .create(&ConnectionId::from("seed"), create_payload("u1", "Original"))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn create_broadcasts_to_room_members_only() {
        let h = harness();
        let mut in_room = subscribe(&h.fanout, "a", ROOM);
        let mut other_room = subscribe(&h.fanout, "b", "comment:event:e1");

        let created = h
            .pipeline
            .create(&ConnectionId::from("a"), create_payload("u1", "  Great view  "))
            .await
            .unwrap();
        assert_eq!(created.content, "Great view");
        assert_eq!(created.socket_id.as_deref(), Some("a"));
        assert_eq!(created.user.name, "Ana");

        let frames = drain(&mut in_room);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], EventName::NEW);
        assert_eq!(frames[0]["data"]["id"], created.id.as_str());
        assert_eq!(frames[0]["data"]["user"]["avatar"], "https://cdn/ana.png");
        assert!(drain(&mut other_room).is_empty());
    }

    #[tokio::test]
    async fn create_with_blank_content_persists_nothing() {
        let h = harness();
        let mut rx = subscribe(&h.fanout, "a", "comment:event:e1");

        let payload = CreateCommentPayload {
            target_type: Some("event".to_string()),
            target_id: Some("e1".to_string()),
            user_id: Some("u1".to_string()),
            content: Some("   ".to_string()),
            parent_id: None,
        };
        let err = h
            .pipeline
            .create(&ConnectionId::from("a"), payload)
            .await
            .unwrap_err();

        assert_eq!(err, CommentError::Validation);
        assert!(h.store.is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn create_rejects_missing_or_unknown_fields() {
        let h = harness();
        let a = ConnectionId::from("a");

        let mut missing_user = create_payload("u1", "hi");
        missing_user.user_id = None;
        let mut empty_target = create_payload("u1", "hi");
        empty_target.target_id = Some(String::new());
        let mut unknown_type = create_payload("u1", "hi");
        unknown_type.target_type = Some("venue".to_string());

        for payload in [missing_user, empty_target, unknown_type] {
            assert_eq!(
                h.pipeline.create(&a, payload).await.unwrap_err(),
                CommentError::Validation
            );
        }
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn create_store_failure_is_server_error() {
        let h = harness();
        // u3 is not a known user, so the store refuses the row.
        let err = h
            .pipeline
            .create(&ConnectionId::from("a"), create_payload("u3", "hi"))
            .await
            .unwrap_err();
        assert_eq!(err, CommentError::Server);
    }

    #[tokio::test]
    async fn create_keeps_parent_and_treats_empty_parent_as_top_level() {
        let h = harness();
        let a = ConnectionId::from("a");
        let parent = seed(&h).await;

        let mut reply = create_payload("u2", "Agreed");
        reply.parent_id = Some(parent.clone());
        let created = h.pipeline.create(&a, reply).await.unwrap();
        assert_eq!(created.parent_id.as_deref(), Some(parent.as_str()));

        let mut top_level = create_payload("u2", "New thread");
        top_level.parent_id = Some(String::new());
        let created = h.pipeline.create(&a, top_level).await.unwrap();
        assert!(created.parent_id.is_none());
        let stored = h.store.find(&created.id).await.unwrap().unwrap();
        assert!(stored.parent_id.is_none());
    }

    #[tokio::test]
    async fn update_by_owner_broadcasts_new_content() {
        let h = harness();
        let id = seed(&h).await;
        let mut rx = subscribe(&h.fanout, "a", ROOM);

        let updated = h
            .pipeline
            .update(UpdateCommentPayload {
                id: Some(id.clone()),
                target_type: Some("location".to_string()),
                target_id: Some("loc1".to_string()),
                user_id: Some("u1".to_string()),
                content: Some(" Edited ".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(updated.content, "Edited");
        assert!(updated.socket_id.is_none());

        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], EventName::UPDATED);
        assert_eq!(frames[0]["data"]["content"], "Edited");
    }

    #[tokio::test]
    async fn update_by_other_user_is_forbidden() {
        let h = harness();
        let id = seed(&h).await;
        let mut rx = subscribe(&h.fanout, "a", ROOM);

        let err = h
            .pipeline
            .update(UpdateCommentPayload {
                id: Some(id.clone()),
                target_type: Some("location".to_string()),
                target_id: Some("loc1".to_string()),
                user_id: Some("u2".to_string()),
                content: Some("Hijacked".to_string()),
            })
            .await
            .unwrap_err();

        assert_eq!(err, CommentError::Forbidden);
        assert!(drain(&mut rx).is_empty());
        let stored = h.store.find(&id).await.unwrap().unwrap();
        assert_eq!(stored.content, "Original");
    }

    #[tokio::test]
    async fn update_missing_comment_is_forbidden() {
        let h = harness();
        let err = h
            .pipeline
            .update(UpdateCommentPayload {
                id: Some("cmt_missing".to_string()),
                target_type: Some("location".to_string()),
                target_id: Some("loc1".to_string()),
                user_id: Some("u1".to_string()),
                content: Some("x".to_string()),
            })
            .await
            .unwrap_err();
        assert_eq!(err, CommentError::Forbidden);
    }

    #[tokio::test]
    async fn delete_by_owner_removes_and_broadcasts() {
        let h = harness();
        let id = seed(&h).await;
        let mut rx = subscribe(&h.fanout, "a", ROOM);

        let deleted = h
            .pipeline
            .delete(DeleteCommentPayload {
                id: Some(id.clone()),
                target_type: Some("location".to_string()),
                target_id: Some("loc1".to_string()),
                user_id: Some("u1".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(deleted.id, id);

        let frames = drain(&mut rx);
        assert_eq!(
            frames,
            vec![serde_json::json!({
                "event": "comment:deleted",
                "data": { "id": id, "targetType": "location", "targetId": "loc1" },
            })]
        );
        assert!(h.store.find(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_by_other_user_is_forbidden() {
        let h = harness();
        let id = seed(&h).await;

        let err = h
            .pipeline
            .delete(DeleteCommentPayload {
                id: Some(id.clone()),
                target_type: Some("location".to_string()),
                target_id: Some("loc1".to_string()),
                user_id: Some("u2".to_string()),
            })
            .await
            .unwrap_err();

        assert_eq!(err, CommentError::Forbidden);
        assert!(h.store.find(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn typing_skips_sender_and_drops_malformed_input() {
        let h = harness();
        let mut rx_a = subscribe(&h.fanout, "a", ROOM);
        let mut rx_b = subscribe(&h.fanout, "b", ROOM);
        let a = ConnectionId::from("a");

        assert!(h.pipeline.typing(
            &a,
            TypingPayload {
                target_type: Some("location".to_string()),
                target_id: Some("loc1".to_string()),
                user_id: Some("u1".to_string()),
            },
        ));
        assert!(drain(&mut rx_a).is_empty());
        let frames = drain(&mut rx_b);
        assert_eq!(frames[0]["event"], EventName::TYPING);
        assert_eq!(frames[0]["data"]["userId"], "u1");

        assert!(!h.pipeline.typing(&a, TypingPayload::default()));
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn history_returns_recorded_comments_capped_by_limit() {
        let h = harness();
        let first = seed(&h).await;
        let second = seed(&h).await;

        let request = |limit| HistoryPayload {
            target_type: Some("location".to_string()),
            target_id: Some("loc1".to_string()),
            limit,
        };

        // Recording happens on a detached task.
        let mut entries = Vec::new();
        for _ in 0..50 {
            entries = h.pipeline.history(request(None)).await.unwrap();
            if entries.len() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![second.as_str(), first.as_str()]);

        assert_eq!(h.pipeline.history(request(Some(1))).await.unwrap().len(), 1);
        assert!(h.pipeline.history(request(Some(0))).await.unwrap().is_empty());
        assert_eq!(
            h.pipeline
                .history(HistoryPayload::default())
                .await
                .unwrap_err(),
            CommentError::Validation
        );
    }

    struct FailingStore;

    #[async_trait]
    impl CommentStore for FailingStore {
        async fn create(&self, _: NewComment) -> Result<Comment, StoreError> {
            Err(StoreError::Other("down".to_string()))
        }
        async fn find(&self, _: &str) -> Result<Option<Comment>, StoreError> {
            Err(StoreError::Other("down".to_string()))
        }
        async fn update_content(&self, _: &str, _: &str) -> Result<Option<Comment>, StoreError> {
            Err(StoreError::Other("down".to_string()))
        }
        async fn delete(&self, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Other("down".to_string()))
        }
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_server_error_without_broadcast() {
        let fanout = Arc::new(Fanout::new(Arc::new(RoomRegistry::new())));
        let mut rx = subscribe(&fanout, "a", ROOM);
        let pipeline = CommentPipeline::new(
            Arc::new(FailingStore),
            fanout.clone(),
            RecentHistory::new(Arc::new(MemoryStore::new()), 10),
            5,
        );

        let err = pipeline
            .delete(DeleteCommentPayload {
                id: Some("c1".to_string()),
                target_type: Some("location".to_string()),
                target_id: Some("loc1".to_string()),
                user_id: Some("u1".to_string()),
            })
            .await
            .unwrap_err();

        assert_eq!(err, CommentError::Server);
        assert!(drain(&mut rx).is_empty());
    }
}
