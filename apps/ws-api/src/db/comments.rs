//! Persistence gateway for comments.
//!
//! The gateway only needs create / find / update / delete by id. PostgreSQL backs it in
//! production; the in-memory store backs tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use backend_common::id::{prefix, prefixed_ulid};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::AsyncPgConnection;
use parking_lot::Mutex;

use crate::db::pool::DbPool;
use crate::db::schema::{comments, users};
use crate::error::StoreError;
use crate::models::comment::{Comment, CommentRow, NewComment, NewCommentRow};
use crate::models::user::Author;

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Persist a new comment and return it with its author's profile.
    async fn create(&self, comment: NewComment) -> Result<Comment, StoreError>;
    async fn find(&self, id: &str) -> Result<Option<Comment>, StoreError>;
    /// Replace the content of a comment. Returns `None` if it no longer exists.
    async fn update_content(&self, id: &str, content: &str) -> Result<Option<Comment>, StoreError>;
    /// Returns whether a row was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL implementation
// ---------------------------------------------------------------------------

pub struct PgCommentStore {
    pool: DbPool,
}

impl PgCommentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn load_author(conn: &mut AsyncPgConnection, user_id: &str) -> Result<Author, StoreError> {
    let author: Author = diesel_async::RunQueryDsl::get_result(
        users::table.find(user_id).select(Author::as_select()),
        conn,
    )
    .await?;
    Ok(author)
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn create(&self, comment: NewComment) -> Result<Comment, StoreError> {
        let mut conn = self.pool.get().await?;

        let id = prefixed_ulid(prefix::COMMENT);
        let now = Utc::now();
        let (location_id, event_id) = comment.target_columns();

        let row: CommentRow = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(comments::table)
                .values(NewCommentRow {
                    id: &id,
                    content: &comment.content,
                    user_id: &comment.user_id,
                    location_id,
                    event_id,
                    parent_id: comment.parent_id.as_deref(),
                    created_at: now,
                    updated_at: now,
                })
                .returning(CommentRow::as_returning()),
            &mut conn,
        )
        .await?;

        let author = load_author(&mut conn, &row.user_id).await?;
        Ok(Comment::from_row(row, author))
    }

    async fn find(&self, id: &str) -> Result<Option<Comment>, StoreError> {
        let mut conn = self.pool.get().await?;

        let found: Option<(CommentRow, Author)> = diesel_async::RunQueryDsl::get_result(
            comments::table
                .inner_join(users::table)
                .filter(comments::id.eq(id))
                .select((CommentRow::as_select(), Author::as_select())),
            &mut conn,
        )
        .await
        .optional()?;

        Ok(found.map(|(row, author)| Comment::from_row(row, author)))
    }

    async fn update_content(&self, id: &str, content: &str) -> Result<Option<Comment>, StoreError> {
        let mut conn = self.pool.get().await?;

        let row: Option<CommentRow> = diesel_async::RunQueryDsl::get_result(
            diesel::update(comments::table.find(id))
                .set((
                    comments::content.eq(content),
                    comments::updated_at.eq(Utc::now()),
                ))
                .returning(CommentRow::as_returning()),
            &mut conn,
        )
        .await
        .optional()?;

        match row {
            Some(row) => {
                let author = load_author(&mut conn, &row.user_id).await?;
                Ok(Some(Comment::from_row(row, author)))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        let removed =
            diesel_async::RunQueryDsl::execute(diesel::delete(comments::table.find(id)), &mut conn)
                .await?;
        Ok(removed > 0)
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (for tests / local development)
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryInner {
    users: HashMap<String, Author>,
    comments: HashMap<String, Comment>,
}

/// Comment store kept in process memory. Like the database, it refuses comments from
/// users it does not know.
#[derive(Default)]
pub struct MemoryCommentStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user so comments can be attributed to them.
    pub fn insert_user(&self, id: &str, name: &str, avatar: Option<&str>) {
        self.inner.lock().users.insert(
            id.to_string(),
            Author {
                id: id.to_string(),
                name: name.to_string(),
                avatar: avatar.map(str::to_string),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn create(&self, comment: NewComment) -> Result<Comment, StoreError> {
        let mut inner = self.inner.lock();
        let author = inner
            .users
            .get(&comment.user_id)
            .cloned()
            .ok_or_else(|| StoreError::Other(format!("unknown user {}", comment.user_id)))?;

        let (location_id, event_id) = comment.target_columns();
        let saved = Comment {
            id: prefixed_ulid(prefix::COMMENT),
            content: comment.content.clone(),
            user_id: comment.user_id.clone(),
            location_id: location_id.map(str::to_string),
            event_id: event_id.map(str::to_string),
            parent_id: comment.parent_id.clone(),
            created_at: Utc::now(),
            author,
        };
        inner.comments.insert(saved.id.clone(), saved.clone());
        Ok(saved)
    }

    async fn find(&self, id: &str) -> Result<Option<Comment>, StoreError> {
        Ok(self.inner.lock().comments.get(id).cloned())
    }

    async fn update_content(&self, id: &str, content: &str) -> Result<Option<Comment>, StoreError> {
        let mut inner = self.inner.lock();
        Ok(inner.comments.get_mut(id).map(|comment| {
            comment.content = content.to_string();
            comment.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().comments.remove(id).is_some())
    }
}
