//! Best-effort recent-history log per room.
//!
//! Written after a successful broadcast and never read to decide delivery. Writes run on a
//! detached task so a slow or failing cache cannot hold up the broadcast or the ack.

use std::collections::HashSet;
use std::sync::Arc;

use crate::db::kv::KeyValueStore;
use crate::error::StoreError;

use super::events::CommentPayload;

pub struct RecentHistory {
    kv: Arc<dyn KeyValueStore>,
    max_len: usize,
}

impl RecentHistory {
    pub fn new(kv: Arc<dyn KeyValueStore>, max_len: usize) -> Self {
        Self { kv, max_len }
    }

    /// Cache key of a room's history list.
    pub fn key(room: &str) -> String {
        format!("messages:{room}")
    }

    /// Queue an append without waiting for it. Failures are logged only.
    pub fn record(&self, room: &str, payload: &CommentPayload) {
        let json = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(?err, room, "failed to serialize history entry");
                return;
            }
        };

        let kv = self.kv.clone();
        let key = Self::key(room);
        let max_len = self.max_len;
        tokio::spawn(async move {
            if let Err(err) = kv.push_capped(&key, &json, max_len).await {
                tracing::error!(%err, key = %key, "history append failed");
            }
        });
    }

    /// Up to `limit` most recent entries, newest first, one per comment id.
    ///
    /// An edited comment appears once with its latest content. Entries that no longer decode
    /// are skipped.
    pub async fn recent(&self, room: &str, limit: usize) -> Result<Vec<CommentPayload>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let raw = self.kv.range(&Self::key(room), self.max_len).await?;

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for item in raw {
            let payload: CommentPayload = match serde_json::from_str(&item) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(?err, room, "skipping undecodable history entry");
                    continue;
                }
            };
            if seen.insert(payload.id.clone()) {
                entries.push(payload);
                if entries.len() >= limit {
                    break;
                }
            }
        }
        Ok(entries)
    }
}
