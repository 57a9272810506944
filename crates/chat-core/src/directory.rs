//! Room directory.
//!
//! The directory owns every live [`ChatRoom`]. Rooms are only reachable
//! through map guards, so a room is never used after it has been removed.
//!
//! Holding a guard locks the room's shard of the map. Drop it before
//! calling back into the directory.

use crate::room::{Broadcast, ChatRoom};
use chat_protocol::{ChatEvent, ProtocolError, RoomId};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use prochord_chat_transport::{ConnectionId, Session};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No live room with this id.
    #[error("Chat room not found: {0}")]
    RoomNotFound(RoomId),

    /// The broadcast envelope could not be encoded.
    #[error("Failed to encode broadcast: {0}")]
    Encode(#[from] ProtocolError),
}

/// Outcome of an exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Leave announcement delivery.
    pub broadcast: Broadcast,
    /// Whether the room was removed because it became empty.
    pub room_removed: bool,
}

/// Directory statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryStats {
    /// Number of live rooms.
    pub room_count: usize,
    /// Participants across all rooms.
    pub participant_count: usize,
}

/// Registry of live chat rooms.
pub struct RoomDirectory {
    /// Rooms indexed by id.
    rooms: DashMap<RoomId, ChatRoom>,
    /// Next candidate room id.
    next_id: AtomicI64,
}

impl RoomDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        info!("Creating room directory");
        Self {
            rooms: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Produce a room id that is not currently live.
    ///
    /// Ids come from a strictly increasing counter. Ids a client already
    /// claimed through ENTER are skipped.
    pub fn allocate_room_id(&self) -> RoomId {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            if !self.rooms.contains_key(&id) {
                return id;
            }
        }
    }

    /// Get the room for `room_id`, creating an empty one if it does not exist.
    ///
    /// Concurrent callers for the same id always observe the same room.
    pub fn get_or_create(&self, room_id: RoomId) -> RefMut<'_, RoomId, ChatRoom> {
        self.rooms.entry(room_id).or_insert_with(|| {
            debug!(room = room_id, "Creating new chat room");
            ChatRoom::new(room_id)
        })
    }

    /// Get an existing room.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::RoomNotFound`] if the room does not exist.
    pub fn get(&self, room_id: RoomId) -> Result<RefMut<'_, RoomId, ChatRoom>, DirectoryError> {
        self.rooms
            .get_mut(&room_id)
            .ok_or(DirectoryError::RoomNotFound(room_id))
    }

    /// Remove the room if it has no participants.
    ///
    /// The emptiness check and the removal are atomic, so a participant
    /// registered in between keeps the room alive.
    pub fn remove_if_empty(&self, room_id: RoomId) -> bool {
        let removed = self
            .rooms
            .remove_if(&room_id, |_, room| room.is_empty())
            .is_some();
        if removed {
            debug!(room = room_id, "Deleted empty chat room");
        }
        removed
    }

    /// Enter a room, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the announcement cannot be encoded.
    pub fn enter(
        &self,
        event: ChatEvent,
        session: Arc<dyn Session>,
    ) -> Result<Broadcast, DirectoryError> {
        let mut room = self.get_or_create(event.room_id);
        Ok(room.enter(event, session)?)
    }

    /// Join an existing room.
    ///
    /// # Errors
    ///
    /// Returns an error if the room does not exist or the announcement
    /// cannot be encoded.
    pub fn join(
        &self,
        event: ChatEvent,
        session: Arc<dyn Session>,
    ) -> Result<Broadcast, DirectoryError> {
        let mut room = self.get(event.room_id)?;
        Ok(room.join(event, session)?)
    }

    /// Broadcast a talk event to an existing room.
    ///
    /// # Errors
    ///
    /// Returns an error if the room does not exist or the event cannot be encoded.
    pub fn talk(&self, username: &str, event: ChatEvent) -> Result<Broadcast, DirectoryError> {
        let room = self.get(event.room_id)?;
        Ok(room.send(username, event)?)
    }

    /// Leave a room and remove it if that emptied it.
    ///
    /// # Errors
    ///
    /// Returns an error if the room does not exist or the announcement
    /// cannot be encoded.
    pub fn exit(&self, event: ChatEvent) -> Result<ExitOutcome, DirectoryError> {
        let room_id = event.room_id;
        let result = {
            let mut room = self.get(room_id)?;
            room.exit(event)
        };

        // The participant is gone even if the announcement failed.
        let room_removed = self.remove_if_empty(room_id);

        Ok(ExitOutcome {
            broadcast: result?,
            room_removed,
        })
    }

    /// Remove a connection from every room it is registered in.
    ///
    /// Returns the ids of the rooms it was removed from.
    pub fn leave_all(&self, connection_id: &ConnectionId) -> Vec<RoomId> {
        let mut left = Vec::new();
        for mut entry in self.rooms.iter_mut() {
            if !entry.value_mut().remove_connection(connection_id).is_empty() {
                left.push(*entry.key());
            }
        }

        for room_id in &left {
            self.remove_if_empty(*room_id);
        }

        debug!(connection = %connection_id, rooms = left.len(), "Left all rooms");
        left
    }

    /// Check if a room exists.
    #[must_use]
    pub fn contains(&self, room_id: RoomId) -> bool {
        self.rooms.contains_key(&room_id)
    }

    /// Number of live rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Check if there are no live rooms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Ids of all live rooms, sorted.
    #[must_use]
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Participant count of a room (0 if it does not exist).
    #[must_use]
    pub fn participant_count(&self, room_id: RoomId) -> usize {
        self.rooms.get(&room_id).map(|r| r.len()).unwrap_or(0)
    }

    /// Get directory statistics.
    #[must_use]
    pub fn stats(&self) -> DirectoryStats {
        DirectoryStats {
            room_count: self.rooms.len(),
            participant_count: self.rooms.iter().map(|r| r.len()).sum(),
        }
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}
