//! In-process session.
//!
//! Records every frame it is asked to send. Sends and closes can be made to
//! fail, which is how broadcast failure isolation is exercised.

use bytes::Bytes;
use chat_protocol::{codec, Envelope};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

use crate::traits::{ConnectionId, Session, TransportError};

/// A session that keeps sent frames in memory.
#[derive(Debug)]
pub struct MemorySession {
    id: ConnectionId,
    sent: Mutex<Vec<Bytes>>,
    is_open: AtomicBool,
    fail_sends: AtomicBool,
    fail_close: AtomicBool,
    close_calls: AtomicUsize,
}

impl MemorySession {
    /// Create a new open session.
    #[must_use]
    pub fn new(id: impl Into<ConnectionId>) -> Self {
        Self {
            id: id.into(),
            sent: Mutex::new(Vec::new()),
            is_open: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent closes fail (or succeed again).
    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Frames sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Bytes> {
        self.frames().clone()
    }

    /// Drain the frames sent so far.
    pub fn take_sent(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.frames())
    }

    /// Frames sent so far, decoded as envelopes. Undecodable frames are skipped.
    #[must_use]
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.frames()
            .iter()
            .filter_map(|data| codec::decode(data).ok())
            .collect()
    }

    /// Number of times `close` was called.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    fn frames(&self) -> MutexGuard<'_, Vec<Bytes>> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Session for MemorySession {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn send(&self, data: Bytes) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("simulated failure".into()));
        }

        trace!(connection = %self.id, bytes = data.len(), "Recorded frame");
        self.frames().push(data);
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::CloseFailed("simulated failure".into()));
        }
        self.is_open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }
}
