//! Resumable frame decoding state machine.
//!
//! One [`FrameDecoder`] instance is scoped to one connection. The transport
//! feeds it whatever bytes arrive; [`FrameDecoder::poll_frame`] either emits
//! a decoded JSON payload, reports that it needs more bytes (`Ok(None)`),
//! or fails with a protocol error. Suspension is cooperative: the decoder
//! never blocks or busy-waits, it simply returns and resumes exactly where
//! it left off on the next delivery.
//!
//! States advance strictly forward — `Magic → Version → Length → Payload` —
//! and wrap back to `Magic` after each emitted frame. There is no skipping
//! and no backward transition. Partial-frame state lives only inside the
//! decoder and is discarded with it when the connection closes.

use bytes::{Buf, BytesMut};
use serde_json::Value;
use tracing::trace;
use vigil_core::{DEFAULT_MAX_FRAME_LEN, FRAME_MAGIC, PROTOCOL_VERSION, ProtocolError};

/// Where the decoder is within the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecodeState {
    /// Awaiting the 4 magic bytes.
    Magic,
    /// Awaiting the 1 version byte.
    Version,
    /// Awaiting the 8 little-endian length bytes.
    Length,
    /// Awaiting exactly `expected` payload bytes.
    Payload {
        /// Declared payload length from the header.
        expected: usize,
    },
}

/// Per-connection resumable frame decoder.
///
/// After a connection-fatal error ([`ProtocolError::is_connection_fatal`])
/// the decoder's stream position is no longer trustworthy and the instance
/// must be discarded along with the connection. After a
/// [`ProtocolError::MalformedPayload`] the decoder is already aligned on
/// the next frame and may keep decoding if the transport's policy allows.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
    buf: BytesMut,
    version: u8,
    max_frame_len: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder expecting [`PROTOCOL_VERSION`] with the default
    /// frame-length cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(PROTOCOL_VERSION, DEFAULT_MAX_FRAME_LEN)
    }

    /// Create a decoder with an explicit expected version and length cap.
    #[must_use]
    pub fn with_limits(version: u8, max_frame_len: u64) -> Self {
        Self {
            state: DecodeState::Magic,
            buf: BytesMut::new(),
            version,
            max_frame_len,
        }
    }

    /// Append newly delivered bytes to the decode buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes currently buffered but not yet consumed.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop all partial state, returning to the start of a frame.
    ///
    /// Used when the transport resets or reuses the decoder; a closed
    /// connection simply drops the instance instead.
    pub fn reset(&mut self) {
        self.state = DecodeState::Magic;
        self.buf.clear();
    }

    /// Try to decode one frame from the buffered bytes.
    ///
    /// Returns `Ok(Some(json))` when a complete frame was decoded,
    /// `Ok(None)` when more bytes are needed (call [`Self::feed`] and poll
    /// again), or an error on a protocol fault. Never reads past a declared
    /// payload boundary into the next frame.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::BadMagic`] / [`ProtocolError::BadVersion`] on a
    /// header mismatch, [`ProtocolError::FrameTooLarge`] when the declared
    /// length exceeds the cap, [`ProtocolError::MalformedPayload`] when a
    /// complete payload is not valid JSON.
    pub fn poll_frame(&mut self) -> Result<Option<Value>, ProtocolError> {
        loop {
            match self.state {
                DecodeState::Magic => {
                    if self.buf.len() < FRAME_MAGIC.len() {
                        return Ok(None);
                    }
                    let mut found = [0u8; 4];
                    found.copy_from_slice(&self.buf.split_to(4));
                    if found != FRAME_MAGIC {
                        return Err(ProtocolError::BadMagic {
                            expected: FRAME_MAGIC,
                            found,
                        });
                    }
                    self.state = DecodeState::Version;
                }
                DecodeState::Version => {
                    if self.buf.is_empty() {
                        return Ok(None);
                    }
                    let found = self.buf.get_u8();
                    if found != self.version {
                        return Err(ProtocolError::BadVersion {
                            expected: self.version,
                            found,
                        });
                    }
                    self.state = DecodeState::Length;
                }
                DecodeState::Length => {
                    if self.buf.len() < 8 {
                        return Ok(None);
                    }
                    let declared = self.buf.get_u64_le();
                    if declared > self.max_frame_len {
                        return Err(ProtocolError::FrameTooLarge {
                            declared,
                            max: self.max_frame_len,
                        });
                    }
                    // Cap check above keeps this conversion in range.
                    let expected = usize::try_from(declared).map_err(|_| {
                        ProtocolError::FrameTooLarge {
                            declared,
                            max: self.max_frame_len,
                        }
                    })?;
                    trace!(expected, "frame length read");
                    self.state = DecodeState::Payload { expected };
                }
                DecodeState::Payload { expected } => {
                    if self.buf.len() < expected {
                        return Ok(None);
                    }
                    let payload = self.buf.split_to(expected);
                    // Aligned on the next frame regardless of parse outcome.
                    self.state = DecodeState::Magic;
                    let value = serde_json::from_slice(&payload)?;
                    return Ok(Some(value));
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
