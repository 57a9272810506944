//! Envelope types for the chat protocol.
//!
//! An envelope is the unit exchanged over a connection. Its `type` tag
//! selects the operation and its `payload` is always a [`ChatEvent`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// A chat room identifier (`chatRoomId` on the wire).
pub type RoomId = i64;

/// Username the server uses for messages it originates.
pub const SYSTEM_USERNAME: &str = "system";

/// Message shown alongside a freshly allocated room id.
pub const NEW_ID_MESSAGE: &str = "이 ID로 채팅방에 입장하세요.";

/// Message type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Server-only: a candidate room id for a new connection.
    NewId,
    /// Create the room if needed and register the sender.
    Enter,
    /// Register the sender in an existing room.
    Join,
    /// Broadcast a message to the room.
    Talk,
    /// Leave the room and close the connection.
    Exit,
}

impl MessageType {
    /// Wire name of this type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::NewId => "NEW_ID",
            MessageType::Enter => "ENTER",
            MessageType::Join => "JOIN",
            MessageType::Talk => "TALK",
            MessageType::Exit => "EXIT",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat event: the payload of every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Target room.
    #[serde(rename = "chatRoomId")]
    pub room_id: RoomId,
    /// Sender username.
    pub username: String,
    /// Message body. Optional on input; ENTER, JOIN and EXIT overwrite it.
    #[serde(default)]
    pub message: String,
}

impl ChatEvent {
    /// Create a new chat event.
    #[must_use]
    pub fn new(room_id: RoomId, username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            room_id,
            username: username.into(),
            message: message.into(),
        }
    }

    /// Replace the message body.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// A protocol envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Envelope {
    /// Candidate room id pushed to a connection right after it opens.
    NewId(ChatEvent),
    /// Enter a room, creating it if it does not exist.
    Enter(ChatEvent),
    /// Join an existing room.
    Join(ChatEvent),
    /// Talk in a room.
    Talk(ChatEvent),
    /// Exit a room.
    Exit(ChatEvent),
}

impl Envelope {
    /// Build an envelope of the given type around an event.
    #[must_use]
    pub fn new(message_type: MessageType, event: ChatEvent) -> Self {
        match message_type {
            MessageType::NewId => Envelope::NewId(event),
            MessageType::Enter => Envelope::Enter(event),
            MessageType::Join => Envelope::Join(event),
            MessageType::Talk => Envelope::Talk(event),
            MessageType::Exit => Envelope::Exit(event),
        }
    }

    /// Create the `NEW_ID` envelope announcing a candidate room id.
    #[must_use]
    pub fn new_id(room_id: RoomId) -> Self {
        Envelope::NewId(ChatEvent::new(room_id, SYSTEM_USERNAME, NEW_ID_MESSAGE))
    }

    /// Get the message type.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Envelope::NewId(_) => MessageType::NewId,
            Envelope::Enter(_) => MessageType::Enter,
            Envelope::Join(_) => MessageType::Join,
            Envelope::Talk(_) => MessageType::Talk,
            Envelope::Exit(_) => MessageType::Exit,
        }
    }

    /// Borrow the payload.
    #[must_use]
    pub fn event(&self) -> &ChatEvent {
        match self {
            Envelope::NewId(event)
            | Envelope::Enter(event)
            | Envelope::Join(event)
            | Envelope::Talk(event)
            | Envelope::Exit(event) => event,
        }
    }

    /// Target room of this envelope.
    #[must_use]
    pub fn room_id(&self) -> RoomId {
        self.event().room_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_type() {
        let enter = Envelope::Enter(ChatEvent::new(1, "alice", ""));
        assert_eq!(enter.message_type(), MessageType::Enter);

        let new_id = Envelope::new_id(3);
        assert_eq!(new_id.message_type(), MessageType::NewId);
        assert_eq!(new_id.event().username, SYSTEM_USERNAME);
        assert_eq!(new_id.room_id(), 3);
    }

    #[test]
    fn test_wire_shape() {
        let envelope = Envelope::Talk(ChatEvent::new(7, "alice", "hello"));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "TALK",
                "payload": { "chatRoomId": 7, "username": "alice", "message": "hello" }
            })
        );

        let value = serde_json::to_value(Envelope::new_id(1)).unwrap();
        assert_eq!(value["type"], "NEW_ID");
    }

    #[test]
    fn test_missing_message_defaults_to_empty() {
        let envelope: Envelope = serde_json::from_value(json!({
            "type": "ENTER",
            "payload": { "chatRoomId": 2, "username": "bob" }
        }))
        .unwrap();

        assert_eq!(envelope, Envelope::Enter(ChatEvent::new(2, "bob", "")));
    }

    #[test]
    fn test_message_type_names() {
        for ty in [
            MessageType::NewId,
            MessageType::Enter,
            MessageType::Join,
            MessageType::Talk,
            MessageType::Exit,
        ] {
            let value = serde_json::to_value(ty).unwrap();
            assert_eq!(value, json!(ty.as_str()));
            assert_eq!(Envelope::new(ty, ChatEvent::new(1, "a", "")).message_type(), ty);
        }
    }
}
