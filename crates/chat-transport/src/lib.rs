//! # prochord-chat-transport
//!
//! Transport abstraction layer for the Prochord chat server.
//!
//! The chat core never touches sockets. It pushes encoded envelopes to
//! [`Session`] handles and asks them to close; the transport owns the
//! connection lifecycle behind them.
//!
//! - **WebSocket** - [`WebSocketSession`], a queue drained into an axum socket
//! - **Memory** - [`MemorySession`], records frames in process
//!
//! ```rust,ignore
//! use prochord_chat_transport::Session;
//!
//! fn greet(session: &dyn Session, frame: bytes::Bytes) {
//!     if let Err(e) = session.send(frame) {
//!         tracing::warn!(connection = %session.id(), error = %e, "Send failed");
//!     }
//! }
//! ```

pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use memory::MemorySession;
pub use traits::{ConnectionId, Session, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketSession;
