use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::schema::users;

/// Public profile of a comment author, as embedded in broadcast payloads.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = users)]
pub struct Author {
    pub id: String,
    pub name: String,
    #[diesel(column_name = profile_avatar)]
    pub avatar: Option<String>,
}
