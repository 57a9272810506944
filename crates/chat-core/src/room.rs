//! Chat room abstraction.
//!
//! A room maps usernames to the sessions they are connected with and
//! broadcasts envelopes to all of them.

use chat_protocol::{codec, ChatEvent, Envelope, ProtocolError, RoomId};
use prochord_chat_transport::{ConnectionId, Session};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Announcement broadcast when a user enters a room.
#[must_use]
pub fn enter_announcement(username: &str) -> String {
    format!("{username}님이 입장하셨습니다.")
}

/// Announcement broadcast when a user joins an existing room.
#[must_use]
pub fn join_announcement(username: &str) -> String {
    format!("{username}님이 참여하셨습니다.")
}

/// Announcement broadcast when a user leaves a room.
#[must_use]
pub fn exit_announcement(username: &str) -> String {
    format!("{username}님이 퇴장하셨습니다.")
}

/// Result of pushing one envelope to every participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Broadcast {
    /// Participants the envelope was handed to.
    pub delivered: usize,
    /// Participants whose session refused it.
    pub failed: usize,
}

impl Broadcast {
    /// Total number of recipients attempted.
    #[must_use]
    pub fn recipients(&self) -> usize {
        self.delivered + self.failed
    }
}

/// A chat room.
pub struct ChatRoom {
    /// Room id.
    room_id: RoomId,
    /// Participants by username.
    participants: HashMap<String, Arc<dyn Session>>,
}

impl ChatRoom {
    /// Create a new empty room.
    #[must_use]
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            participants: HashMap::new(),
        }
    }

    /// Get the room id.
    #[must_use]
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Get the number of participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Check if the room has no participants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Check if a username is registered.
    #[must_use]
    pub fn contains(&self, username: &str) -> bool {
        self.participants.contains_key(username)
    }

    /// Registered usernames, sorted.
    #[must_use]
    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.participants.keys().cloned().collect();
        names.sort();
        names
    }

    /// Register `session` under `event.username` and announce the entrance
    /// to everyone, the newcomer included.
    ///
    /// # Errors
    ///
    /// Returns an error if the announcement cannot be encoded.
    pub fn enter(
        &mut self,
        event: ChatEvent,
        session: Arc<dyn Session>,
    ) -> Result<Broadcast, ProtocolError> {
        let message = enter_announcement(&event.username);
        let event = event.with_message(message);
        self.register(&event.username, session);
        self.broadcast(&Envelope::Enter(event))
    }

    /// Register `session` in an existing room and announce it.
    ///
    /// # Errors
    ///
    /// Returns an error if the announcement cannot be encoded.
    pub fn join(
        &mut self,
        event: ChatEvent,
        session: Arc<dyn Session>,
    ) -> Result<Broadcast, ProtocolError> {
        let message = join_announcement(&event.username);
        let event = event.with_message(message);
        self.register(&event.username, session);
        self.broadcast(&Envelope::Join(event))
    }

    /// Broadcast a talk event from `username` to every participant.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be encoded.
    pub fn send(&self, username: &str, event: ChatEvent) -> Result<Broadcast, ProtocolError> {
        trace!(room = self.room_id, sender = %username, "Talk");
        self.broadcast(&Envelope::Talk(event))
    }

    /// Remove `event.username` and announce the departure to whoever remains.
    ///
    /// The departing session is left open; closing it is up to the caller.
    /// An EXIT for a name that is not registered changes nothing and
    /// announces nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the announcement cannot be encoded.
    pub fn exit(&mut self, event: ChatEvent) -> Result<Broadcast, ProtocolError> {
        if self.participants.remove(&event.username).is_none() {
            debug!(room = self.room_id, username = %event.username, "Exit from non-participant ignored");
            return Ok(Broadcast::default());
        }
        debug!(room = self.room_id, username = %event.username, "Participant left");

        let message = exit_announcement(&event.username);
        self.broadcast(&Envelope::Exit(event.with_message(message)))
    }

    /// Remove every username bound to `connection_id`, announcing each departure.
    ///
    /// Returns the removed usernames.
    pub fn remove_connection(&mut self, connection_id: &ConnectionId) -> Vec<String> {
        let gone: Vec<String> = self
            .participants
            .iter()
            .filter(|(_, session)| session.id() == connection_id)
            .map(|(username, _)| username.clone())
            .collect();

        for username in &gone {
            let event = ChatEvent::new(self.room_id, username.clone(), "");
            if let Err(e) = self.exit(event) {
                warn!(room = self.room_id, username = %username, error = %e, "Failed to announce departure");
            }
        }

        gone
    }

    fn register(&mut self, username: &str, session: Arc<dyn Session>) {
        let connection = session.id().clone();
        match self.participants.insert(username.to_string(), session) {
            Some(previous) if previous.id() != &connection => {
                debug!(
                    room = self.room_id,
                    username = %username,
                    previous = %previous.id(),
                    connection = %connection,
                    "Participant session replaced"
                );
            }
            Some(_) => {}
            None => {
                debug!(
                    room = self.room_id,
                    username = %username,
                    connection = %connection,
                    participants = self.participants.len(),
                    "Participant registered"
                );
            }
        }
    }

    /// Encode once and hand the bytes to every participant.
    ///
    /// A failing session is logged and skipped; it never stops delivery to
    /// the others.
    fn broadcast(&self, envelope: &Envelope) -> Result<Broadcast, ProtocolError> {
        let data = codec::encode(envelope)?;
        let mut report = Broadcast::default();

        for (username, session) in &self.participants {
            match session.send(data.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        room = self.room_id,
                        username = %username,
                        connection = %session.id(),
                        error = %e,
                        "Broadcast to participant failed"
                    );
                    report.failed += 1;
                }
            }
        }

        trace!(
            room = self.room_id,
            message_type = %envelope.message_type(),
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast"
        );

        Ok(report)
    }
}

impl fmt::Debug for ChatRoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatRoom")
            .field("room_id", &self.room_id)
            .field("participants", &self.usernames())
            .finish()
    }
}
