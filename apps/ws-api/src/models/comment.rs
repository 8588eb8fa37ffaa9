use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::schema::comments;

use super::user::Author;

/// The kind of entity a comment thread hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Location,
    Event,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Location => "location",
            TargetType::Event => "event",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "location" => Ok(TargetType::Location),
            "event" => Ok(TargetType::Event),
            _ => Err(()),
        }
    }
}

/// A `comments` row as stored.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = comments)]
pub struct CommentRow {
    pub id: String,
    pub content: String,
    pub user_id: String,
    pub location_id: Option<String>,
    pub event_id: Option<String>,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = comments)]
pub struct NewCommentRow<'a> {
    pub id: &'a str,
    pub content: &'a str,
    pub user_id: &'a str,
    pub location_id: Option<&'a str>,
    pub event_id: Option<&'a str>,
    pub parent_id: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted comment joined with its author's public profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub user_id: String,
    pub location_id: Option<String>,
    pub event_id: Option<String>,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub author: Author,
}

impl Comment {
    pub fn from_row(row: CommentRow, author: Author) -> Self {
        Self {
            id: row.id,
            content: row.content,
            user_id: row.user_id,
            location_id: row.location_id,
            event_id: row.event_id,
            parent_id: row.parent_id,
            created_at: row.created_at,
            author,
        }
    }
}

/// Input for creating a comment. `content` is expected to be trimmed already.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub target_type: TargetType,
    pub target_id: String,
    pub user_id: String,
    pub content: String,
    pub parent_id: Option<String>,
}

impl NewComment {
    /// Split the target into the `(location_id, event_id)` column pair.
    pub fn target_columns(&self) -> (Option<&str>, Option<&str>) {
        match self.target_type {
            TargetType::Location => (Some(self.target_id.as_str()), None),
            TargetType::Event => (None, Some(self.target_id.as_str())),
        }
    }
}
