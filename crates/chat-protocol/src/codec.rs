//! JSON codec for chat envelopes.
//!
//! Each WebSocket message carries exactly one envelope, so no length
//! prefix is needed; the codec only enforces a size ceiling.

use bytes::Bytes;
use thiserror::Error;

use crate::envelope::Envelope;

/// Default maximum encoded envelope size (64 KiB).
pub const MAX_ENVELOPE_SIZE: usize = 64 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Envelope exceeds the size limit.
    #[error("Envelope size {size} exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },

    /// Malformed JSON, unknown `type` or missing payload fields.
    #[error("Malformed envelope: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode an envelope to JSON bytes.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(envelope: &Envelope) -> Result<Bytes, ProtocolError> {
    let data = serde_json::to_vec(envelope)?;
    Ok(Bytes::from(data))
}

/// Decode an envelope using the default size limit.
///
/// # Errors
///
/// Returns an error if the data is too large or not a valid envelope.
pub fn decode(data: &[u8]) -> Result<Envelope, ProtocolError> {
    decode_with_limit(data, MAX_ENVELOPE_SIZE)
}

/// Decode an envelope, rejecting payloads larger than `max_size`.
///
/// # Errors
///
/// Returns an error if the data is too large or not a valid envelope.
pub fn decode_with_limit(data: &[u8], max_size: usize) -> Result<Envelope, ProtocolError> {
    if data.len() > max_size {
        return Err(ProtocolError::TooLarge {
            size: data.len(),
            max: max_size,
        });
    }

    Ok(serde_json::from_slice(data)?)
}

/// Codec carrying a configured size limit.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeCodec {
    max_size: usize,
}

impl EnvelopeCodec {
    /// Create a codec with the default size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_size(MAX_ENVELOPE_SIZE)
    }

    /// Create a codec with a custom size limit.
    #[must_use]
    pub fn with_max_size(max_size: usize) -> Self {
        Self { max_size }
    }

    /// Encode an envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self, envelope: &Envelope) -> Result<Bytes, ProtocolError> {
        encode(envelope)
    }

    /// Decode an envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails or the data is too large.
    pub fn decode(&self, data: &[u8]) -> Result<Envelope, ProtocolError> {
        decode_with_limit(data, self.max_size)
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ChatEvent;

    #[test]
    fn test_encode_decode_roundtrip() {
        let envelope = Envelope::Enter(ChatEvent::new(7, "alice", ""));
        let encoded = encode(&envelope).unwrap();
        assert_eq!(decode(&encoded).unwrap(), envelope);
    }

    #[test]
    fn test_decode_unknown_type() {
        let data = br#"{"type":"SHOUT","payload":{"chatRoomId":1,"username":"a","message":""}}"#;
        match decode(data) {
            Err(ProtocolError::Json(_)) => {}
            other => panic!("Expected Json error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed() {
        assert!(decode(b"not json").is_err());
        assert!(decode(br#"{"type":"TALK"}"#).is_err());
        assert!(decode(br#"{"type":"TALK","payload":{"username":"a"}}"#).is_err());
    }

    #[test]
    fn test_decode_too_large() {
        let codec = EnvelopeCodec::with_max_size(16);
        let envelope = Envelope::Talk(ChatEvent::new(1, "alice", "a long enough message"));
        let encoded = codec.encode(&envelope).unwrap();

        match codec.decode(&encoded) {
            Err(ProtocolError::TooLarge { max, .. }) => assert_eq!(max, 16),
            other => panic!("Expected TooLarge error, got {:?}", other),
        }
    }
}
