//! Room registry: room existence, lookup, and reclamation.

use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use crate::room::Room;

/// Read-only snapshot of a room, as reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub user_count: usize,
    pub draw_history_length: usize,
}

/// All live rooms, keyed by room id.
///
/// Not synchronized: the registry is owned by the relay task, which is the
/// only place rooms are created, mutated, or removed.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the room, creating an empty one on first use.
    pub fn get_or_create(&mut self, room_id: &str) -> &mut Room {
        self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            info!(room_id, "Room created");
            Room::new(room_id.to_string())
        })
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    pub fn lookup(&self, room_id: &str) -> Option<RoomStatus> {
        self.rooms.get(room_id).map(|room| RoomStatus {
            user_count: room.member_count(),
            draw_history_length: room.history().len(),
        })
    }

    /// Remove the room only if it still exists and has no members.
    /// Remove the room only if it has no members. Returns the removed room.
    pub fn remove_if_empty(&mut self, room_id: &str) -> Option<Room> {
        match self.rooms.get(room_id) {
            Some(room) if room.is_empty() => self.rooms.remove(room_id),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
