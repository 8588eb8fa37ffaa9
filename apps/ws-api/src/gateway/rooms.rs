//! Room keys and the in-memory room registry.
//!
//! A room exists only while it has members: the registry is a plain key → set map and
//! drops a key as soon as its set becomes empty. State is per process.

use std::collections::HashSet;

use dashmap::DashMap;

use crate::models::comment::TargetType;

use super::session::ConnectionId;

/// A validated `(targetType, targetId)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub kind: TargetType,
    pub id: String,
}

impl Target {
    /// Returns `None` unless both parts are present, non-empty, and the type is known.
    pub fn parse(target_type: Option<&str>, target_id: Option<&str>) -> Option<Self> {
        let kind = non_empty(target_type)?.parse::<TargetType>().ok()?;
        let id = non_empty(target_id)?;
        Some(Self {
            kind,
            id: id.to_string(),
        })
    }

    pub fn room_key(&self) -> String {
        room_key(self.kind, &self.id)
    }
}

/// `comment:{targetType}:{targetId}`; must match byte-for-byte between subscribe and emit.
pub fn room_key(target_type: TargetType, target_id: &str) -> String {
    format!("comment:{}:{}", target_type.as_str(), target_id)
}

/// Present and non-empty. Not trimmed: only comment content is trimmed.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Room key → member connections, plus the reverse index used on disconnect.
///
/// Neither map's shard guard is ever held while touching the other map.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, HashSet<ConnectionId>>,
    memberships: DashMap<ConnectionId, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Returns `false` if it was already a member.
    pub fn join(&self, connection_id: &ConnectionId, room: &str) -> bool {
        let inserted = self
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id.clone());
        self.memberships
            .entry(connection_id.clone())
            .or_default()
            .insert(room.to_string());
        inserted
    }

    /// Remove a connection from a room. Returns `false` if it was not a member.
    pub fn leave(&self, connection_id: &ConnectionId, room: &str) -> bool {
        let removed = self.remove_member(room, connection_id);

        if let Some(mut rooms) = self.memberships.get_mut(connection_id) {
            rooms.remove(room);
        }
        self.memberships
            .remove_if(connection_id, |_, rooms| rooms.is_empty());

        removed
    }

    /// Remove a connection from every room it joined. Returns how many rooms it left.
    pub fn leave_all(&self, connection_id: &ConnectionId) -> usize {
        let Some((_, rooms)) = self.memberships.remove(connection_id) else {
            return 0;
        };
        for room in &rooms {
            self.remove_member(room, connection_id);
        }
        rooms.len()
    }

    /// Snapshot of a room's current members. Empty if the room does not exist.
    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, connection_id: &ConnectionId, room: &str) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(connection_id))
    }

    /// Number of rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn remove_member(&self, room: &str, connection_id: &ConnectionId) -> bool {
        let removed = match self.rooms.get_mut(room) {
            Some(mut members) => members.remove(connection_id),
            None => false,
        };
        self.rooms.remove_if(room, |_, members| members.is_empty());
        removed
    }
}
