//! WebSocket session implementation.
//!
//! Frames are queued on an unbounded channel and written to the axum socket
//! by a dedicated writer task, so pushing to a session never awaits.

use axum::extract::ws::Message;
use bytes::Bytes;
use futures_util::{Sink, SinkExt};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::traits::{ConnectionId, Session, TransportError};

/// Work queued for the writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// An encoded envelope.
    Frame(Bytes),
    /// A raw pong reply.
    Pong(Vec<u8>),
    /// Send a close frame and stop writing.
    Close,
}

/// A WebSocket connection as seen by the chat core.
#[derive(Debug)]
pub struct WebSocketSession {
    id: ConnectionId,
    queue: mpsc::UnboundedSender<Outbound>,
    is_open: AtomicBool,
}

impl WebSocketSession {
    /// Create a session and the receiving end of its write queue.
    #[must_use]
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (queue, rx) = mpsc::unbounded_channel();
        let session = Self {
            id,
            queue,
            is_open: AtomicBool::new(true),
        };
        (session, rx)
    }

    /// Queue a pong in reply to a ping.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer task has stopped.
    pub fn pong(&self, data: Vec<u8>) -> Result<(), TransportError> {
        self.queue
            .send(Outbound::Pong(data))
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

impl Session for WebSocketSession {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn send(&self, data: Bytes) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed);
        }

        self.queue.send(Outbound::Frame(data)).map_err(|_| {
            self.is_open.store(false, Ordering::SeqCst);
            TransportError::ConnectionClosed
        })
    }

    fn close(&self) -> Result<(), TransportError> {
        if !self.is_open.swap(false, Ordering::SeqCst) {
            return Ok(()); // Already closed
        }

        self.queue
            .send(Outbound::Close)
            .map_err(|_| TransportError::CloseFailed("writer task stopped".into()))
    }

    fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst) && !self.queue.is_closed()
    }
}

/// Drain a session's write queue into a WebSocket sink.
///
/// Returns once a close has been written, the queue is dropped, or the sink fails.
pub async fn write_loop<S>(id: ConnectionId, mut sink: S, mut rx: mpsc::UnboundedReceiver<Outbound>)
where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    while let Some(outbound) = rx.recv().await {
        let message = match outbound {
            Outbound::Frame(data) => match String::from_utf8(data.to_vec()) {
                Ok(text) => Message::Text(text),
                Err(e) => Message::Binary(e.into_bytes()),
            },
            Outbound::Pong(data) => Message::Pong(data),
            Outbound::Close => {
                if let Err(e) = sink.send(Message::Close(None)).await {
                    debug!(connection = %id, error = %e, "Failed to send close frame");
                }
                break;
            }
        };

        if let Err(e) = sink.send(message).await {
            warn!(connection = %id, error = %e, "WebSocket write failed");
            break;
        }
    }

    rx.close();
    if let Err(e) = sink.close().await {
        debug!(connection = %id, error = %e, "WebSocket sink close failed");
    }
    debug!(connection = %id, "Writer stopped");
}
