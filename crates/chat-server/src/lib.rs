//! # prochord-chat-server
//!
//! WebSocket front end for the Prochord chat rooms.
//!
//! Each connection gets a candidate room id on open and then speaks the
//! JSON envelope protocol of `chat-protocol`. The server is single-node:
//! all rooms live in one in-process directory.

pub mod config;
pub mod handlers;
pub mod metrics;

pub use config::Config;
pub use handlers::{app, run_server, serve, AppState};
