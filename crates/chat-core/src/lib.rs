//! # prochord-chat-core
//!
//! Chat rooms and message routing for the Prochord chat server.
//!
//! - **ChatRoom** - participants of one room and broadcast to them
//! - **RoomDirectory** - room id to room registry with atomic get-or-create
//! - **MessageRouter** - decodes envelopes and dispatches them to rooms
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌───────────────┐     ┌───────────────┐     ┌──────────┐
//! │   Session   │────▶│ MessageRouter │────▶│ RoomDirectory │────▶│ ChatRoom │
//! └─────────────┘     └───────────────┘     └───────────────┘     └──────────┘
//!        ▲                                                              │
//!        └──────────────────────── broadcast ───────────────────────────┘
//! ```
//!
//! Everything here is single-process. Rooms live in one in-memory directory
//! and broadcasts go straight to local sessions; running several nodes
//! would need a pub/sub backbone in front of the directory.

pub mod directory;
pub mod room;
pub mod router;

pub use directory::{DirectoryError, DirectoryStats, ExitOutcome, RoomDirectory};
pub use room::{Broadcast, ChatRoom};
pub use router::{MessageRouter, Outcome, RouterConfig, RouterError};
