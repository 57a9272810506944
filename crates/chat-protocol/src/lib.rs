//! # chat-protocol
//!
//! Wire protocol definitions for the Prochord chat server.
//!
//! Every message exchanged over a chat connection is a JSON envelope:
//!
//! ```text
//! { "type": "ENTER" | "TALK" | "EXIT" | "JOIN" | "NEW_ID",
//!   "payload": { "chatRoomId": 7, "username": "alice", "message": "hi" } }
//! ```
//!
//! ## Example
//!
//! ```rust
//! use chat_protocol::{codec, ChatEvent, Envelope};
//!
//! let envelope = Envelope::Talk(ChatEvent::new(7, "alice", "hello"));
//!
//! let encoded = codec::encode(&envelope).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(envelope, decoded);
//! ```

pub mod codec;
pub mod envelope;

pub use codec::{decode, encode, ProtocolError};
pub use envelope::{ChatEvent, Envelope, MessageType, RoomId, NEW_ID_MESSAGE, SYSTEM_USERNAME};
