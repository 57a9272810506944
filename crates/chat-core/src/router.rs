//! Message router for chat connections.
//!
//! The router decodes inbound envelopes and dispatches them to the room
//! directory. Nothing it encounters is fatal to a connection: every error is
//! logged and the message dropped.

use crate::directory::{DirectoryError, RoomDirectory};
use crate::room::Broadcast;
use chat_protocol::codec::{EnvelopeCodec, MAX_ENVELOPE_SIZE};
use chat_protocol::{Envelope, MessageType, ProtocolError, RoomId};
use prochord_chat_transport::{ConnectionId, Session, TransportError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Router errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Malformed or unknown envelope.
    #[error("Protocol decode error: {0}")]
    Protocol(#[source] ProtocolError),

    /// The target room does not exist.
    #[error("Chat room not found: {0}")]
    RoomNotFound(RoomId),

    /// A client sent a server-only message.
    #[error("Unexpected message type from client: {0}")]
    UnexpectedMessage(MessageType),

    /// An outbound envelope could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[source] ProtocolError),

    /// Pushing to the connection failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<DirectoryError> for RouterError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::RoomNotFound(room_id) => RouterError::RoomNotFound(room_id),
            DirectoryError::Encode(e) => RouterError::Encode(e),
        }
    }
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Largest inbound envelope accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_message_size: MAX_ENVELOPE_SIZE,
        }
    }
}

/// What a dispatched envelope did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Type of the handled envelope.
    pub message_type: MessageType,
    /// Target room.
    pub room_id: RoomId,
    /// Delivery of the resulting broadcast.
    pub broadcast: Broadcast,
    /// Whether the room was removed (EXIT only).
    pub room_removed: bool,
}

/// Routes envelopes from connections to chat rooms.
pub struct MessageRouter {
    directory: Arc<RoomDirectory>,
    codec: EnvelopeCodec,
}

impl MessageRouter {
    /// Create a router over `directory` with default configuration.
    #[must_use]
    pub fn new(directory: Arc<RoomDirectory>) -> Self {
        Self::with_config(directory, RouterConfig::default())
    }

    /// Create a router with custom configuration.
    #[must_use]
    pub fn with_config(directory: Arc<RoomDirectory>, config: RouterConfig) -> Self {
        info!("Creating message router with config: {:?}", config);
        Self {
            directory,
            codec: EnvelopeCodec::with_max_size(config.max_message_size),
        }
    }

    /// The directory this router dispatches to.
    #[must_use]
    pub fn directory(&self) -> &Arc<RoomDirectory> {
        &self.directory
    }

    /// Greet a new connection with a candidate room id.
    ///
    /// No room is created; the id is only a suggestion for a later ENTER.
    ///
    /// # Errors
    ///
    /// Returns an error if the `NEW_ID` envelope cannot be encoded or sent.
    pub fn connect(&self, session: &dyn Session) -> Result<RoomId, RouterError> {
        let room_id = self.directory.allocate_room_id();
        let data = self
            .codec
            .encode(&Envelope::new_id(room_id))
            .map_err(RouterError::Encode)?;
        session.send(data)?;

        debug!(connection = %session.id(), room = room_id, "Sent candidate room id");
        Ok(room_id)
    }

    /// Decode and dispatch one inbound payload.
    ///
    /// EXIT closes `session` whether or not the room existed; a failure to
    /// close is logged and does not affect the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid envelope, the target
    /// room is missing (JOIN, TALK, EXIT) or the envelope is server-only.
    pub fn dispatch(
        &self,
        session: &Arc<dyn Session>,
        username: &str,
        data: &[u8],
    ) -> Result<Outcome, RouterError> {
        let envelope = self.codec.decode(data).map_err(RouterError::Protocol)?;
        let message_type = envelope.message_type();
        let room_id = envelope.room_id();

        debug!(
            connection = %session.id(),
            username = %username,
            message_type = %message_type,
            room = room_id,
            "Dispatching envelope"
        );

        let outcome = |broadcast, room_removed| Outcome {
            message_type,
            room_id,
            broadcast,
            room_removed,
        };

        match envelope {
            Envelope::Enter(event) => {
                let broadcast = self.directory.enter(event, Arc::clone(session))?;
                Ok(outcome(broadcast, false))
            }
            Envelope::Join(event) => {
                let broadcast = self.directory.join(event, Arc::clone(session))?;
                Ok(outcome(broadcast, false))
            }
            Envelope::Talk(event) => {
                let broadcast = self.directory.talk(username, event)?;
                Ok(outcome(broadcast, false))
            }
            Envelope::Exit(event) => {
                let result = self.directory.exit(event);

                if let Err(e) = session.close() {
                    error!(connection = %session.id(), error = %e, "Failed to close session");
                }

                let exit = result?;
                Ok(outcome(exit.broadcast, exit.room_removed))
            }
            Envelope::NewId(_) => Err(RouterError::UnexpectedMessage(message_type)),
        }
    }

    /// Handle one inbound payload from a connection loop.
    ///
    /// Errors are logged and the message is dropped; the connection stays usable.
    pub fn handle(
        &self,
        session: &Arc<dyn Session>,
        username: &str,
        data: &[u8],
    ) -> Option<Outcome> {
        match self.dispatch(session, username, data) {
            Ok(outcome) => Some(outcome),
            Err(RouterError::RoomNotFound(room_id)) => {
                warn!(connection = %session.id(), room = room_id, "Chat room not found, message dropped");
                None
            }
            Err(e) => {
                warn!(connection = %session.id(), error = %e, "Message dropped");
                None
            }
        }
    }

    /// Remove a closed connection from every room it was still in.
    pub fn disconnect(&self, connection_id: &ConnectionId) -> Vec<RoomId> {
        let rooms = self.directory.leave_all(connection_id);
        if !rooms.is_empty() {
            debug!(connection = %connection_id, rooms = ?rooms, "Cleaned up after disconnect");
        }
        rooms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_protocol::{codec, ChatEvent};
    use prochord_chat_transport::MemorySession;

    fn router() -> MessageRouter {
        MessageRouter::new(Arc::new(RoomDirectory::new()))
    }

    fn session(id: &str) -> (Arc<MemorySession>, Arc<dyn Session>) {
        let memory = Arc::new(MemorySession::new(id));
        let handle: Arc<dyn Session> = memory.clone();
        (memory, handle)
    }

    fn frame(envelope: Envelope) -> Vec<u8> {
        codec::encode(&envelope).unwrap().to_vec()
    }

    #[test]
    fn test_connect_sends_new_id() {
        let router = router();
        let (memory, handle) = session("conn-1");

        let room_id = router.connect(handle.as_ref()).unwrap();

        assert_eq!(memory.sent_envelopes(), vec![Envelope::new_id(room_id)]);
        assert!(router.directory().is_empty());
    }

    #[test]
    fn test_enter_on_empty_directory() {
        let router = router();
        let (alice, handle) = session("conn-1");

        let outcome = router
            .dispatch(&handle, "alice", &frame(Envelope::Enter(ChatEvent::new(7, "alice", ""))))
            .unwrap();

        assert_eq!(outcome.message_type, MessageType::Enter);
        assert_eq!(outcome.broadcast.delivered, 1);
        assert_eq!(router.directory().room_ids(), vec![7]);
        assert_eq!(
            alice.sent_envelopes(),
            vec![Envelope::Enter(ChatEvent::new(7, "alice", "alice님이 입장하셨습니다."))]
        );
    }

    #[test]
    fn test_exit_last_participant() {
        let router = router();
        let (alice, handle) = session("conn-1");
        router
            .dispatch(&handle, "alice", &frame(Envelope::Enter(ChatEvent::new(7, "alice", ""))))
            .unwrap();

        let outcome = router
            .dispatch(&handle, "alice", &frame(Envelope::Exit(ChatEvent::new(7, "alice", ""))))
            .unwrap();

        assert!(outcome.room_removed);
        assert!(!router.directory().contains(7));
        assert!(!alice.is_open());
    }

    #[test]
    fn test_exit_missing_room_still_closes() {
        let router = router();
        let (alice, handle) = session("conn-1");

        let result =
            router.dispatch(&handle, "alice", &frame(Envelope::Exit(ChatEvent::new(9, "alice", ""))));

        assert!(matches!(result, Err(RouterError::RoomNotFound(9))));
        assert_eq!(alice.close_calls(), 1);
    }

    #[test]
    fn test_close_failure_is_not_fatal() {
        let router = router();
        let (alice, handle) = session("conn-1");
        alice.set_fail_close(true);
        router
            .dispatch(&handle, "alice", &frame(Envelope::Enter(ChatEvent::new(1, "alice", ""))))
            .unwrap();

        let outcome = router
            .handle(&handle, "alice", &frame(Envelope::Exit(ChatEvent::new(1, "alice", ""))))
            .unwrap();

        assert!(outcome.room_removed);
        assert_eq!(alice.close_calls(), 1);
    }

    #[test]
    fn test_join_and_talk_on_missing_room() {
        let router = router();
        let (alice, handle) = session("conn-1");

        let join = router.dispatch(&handle, "alice", &frame(Envelope::Join(ChatEvent::new(4, "alice", ""))));
        let talk = router.dispatch(&handle, "alice", &frame(Envelope::Talk(ChatEvent::new(4, "alice", "hi"))));

        assert!(matches!(join, Err(RouterError::RoomNotFound(4))));
        assert!(matches!(talk, Err(RouterError::RoomNotFound(4))));
        assert!(router.directory().is_empty());
        assert!(alice.sent().is_empty());
        assert!(alice.is_open());
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        let router = router();
        let (alice, handle) = session("conn-1");

        assert!(matches!(
            router.dispatch(&handle, "alice", b"{not json"),
            Err(RouterError::Protocol(_))
        ));
        assert!(router.handle(&handle, "alice", br#"{"type":"DANCE","payload":{}}"#).is_none());
        assert!(alice.is_open());
    }

    #[test]
    fn test_inbound_new_id_is_rejected() {
        let router = router();
        let (_alice, handle) = session("conn-1");

        assert!(matches!(
            router.dispatch(&handle, "alice", &frame(Envelope::new_id(3))),
            Err(RouterError::UnexpectedMessage(MessageType::NewId))
        ));
        assert!(router.directory().is_empty());
    }

    #[test]
    fn test_oversized_payload_is_rejected() {
        let router = MessageRouter::with_config(
            Arc::new(RoomDirectory::new()),
            RouterConfig { max_message_size: 32 },
        );
        let (_alice, handle) = session("conn-1");
        let data = frame(Envelope::Talk(ChatEvent::new(1, "alice", "x".repeat(64))));

        assert!(matches!(
            router.dispatch(&handle, "alice", &data),
            Err(RouterError::Protocol(ProtocolError::TooLarge { .. }))
        ));
    }

    #[test]
    fn test_disconnect_cleans_up() {
        let router = router();
        let (_alice, handle) = session("conn-1");
        router
            .dispatch(&handle, "alice", &frame(Envelope::Enter(ChatEvent::new(2, "alice", ""))))
            .unwrap();

        assert_eq!(router.disconnect(handle.id()), vec![2]);
        assert!(router.directory().is_empty());
    }
}
