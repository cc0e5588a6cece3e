//! A single drawing room: its members and replayable history.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::protocol::{ConnectionId, DrawPayload};

/// A room tracks its member connections and the draw events since the last clear.
#[derive(Debug, Clone)]
pub struct Room {
    room_id: String,
    members: HashSet<ConnectionId>,
    history: Vec<DrawPayload>,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl Room {
    pub fn new(room_id: String) -> Self {
        let now = Utc::now();
        Self {
            room_id,
            members: HashSet::new(),
            history: Vec::new(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the last draw or clear.
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Returns `false` if the connection was already a member.
    pub fn add_member(&mut self, conn_id: ConnectionId) -> bool {
        self.members.insert(conn_id)
    }

    /// Returns `false` if the connection was not a member.
    pub fn remove_member(&mut self, conn_id: &ConnectionId) -> bool {
        self.members.remove(conn_id)
    }

    pub fn contains(&self, conn_id: &ConnectionId) -> bool {
        self.members.contains(conn_id)
    }

    pub fn members(&self) -> impl Iterator<Item = &ConnectionId> {
        self.members.iter()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn history(&self) -> &[DrawPayload] {
        &self.history
    }

    /// Append a draw event. With `max_history` set, the oldest entries are
    /// dropped so at most that many remain.
    pub fn push_draw(&mut self, payload: DrawPayload, max_history: Option<usize>) {
        self.history.push(payload);
        if let Some(max) = max_history {
            if self.history.len() > max {
                let excess = self.history.len() - max;
                self.history.drain(..excess);
            }
        }
        self.last_updated = Utc::now();
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.last_updated = Utc::now();
    }
}
