//! Per-connection glue between the frame codec and the router.
//!
//! A [`ConnectionContext`] is owned by the I/O context that owns the
//! connection; it is not shared and needs no internal locking. Inbound and
//! outbound events for one connection are always processed in order on
//! that context, so the decoder sees a consistent byte stream and token
//! capture pairs with the very next routed response.

use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use vigil_core::{ConnectionId, ProtocolError};
use vigil_proto::{FrameDecoder, OutboundPayload, encode};

use crate::router::ResponseRouter;

/// Ties one connection's decode state to the shared routing machinery.
pub struct ConnectionContext {
    id: ConnectionId,
    decoder: FrameDecoder,
    router: Arc<ResponseRouter>,
}

impl ConnectionContext {
    /// Create a context for a newly accepted connection.
    #[must_use]
    pub fn new(id: ConnectionId, router: Arc<ResponseRouter>) -> Self {
        Self {
            id,
            decoder: FrameDecoder::new(),
            router,
        }
    }

    /// Create a context with an explicit protocol version and frame cap.
    #[must_use]
    pub fn with_limits(
        id: ConnectionId,
        router: Arc<ResponseRouter>,
        version: u8,
        max_frame_len: u64,
    ) -> Self {
        Self {
            id,
            decoder: FrameDecoder::with_limits(version, max_frame_len),
            router,
        }
    }

    /// The connection id this context is bound to.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Encode an outbound request, capturing watched session tokens first.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MalformedPayload`] if JSON serialization fails.
    pub fn on_outbound(&mut self, body: &Value) -> Result<Bytes, ProtocolError> {
        let _ = self.router.tokens().capture_outbound(self.id, body);
        encode(&OutboundPayload::Json(body.clone()))
    }

    /// Encode an arbitrary outbound payload.
    ///
    /// Token capture applies only to JSON payloads; text and raw bodies
    /// pass through untouched.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::UnsupportedPayloadKind`] for a file region.
    pub fn on_outbound_payload(&mut self, payload: &OutboundPayload) -> Result<Bytes, ProtocolError> {
        if let OutboundPayload::Json(body) = payload {
            let _ = self.router.tokens().capture_outbound(self.id, body);
        }
        encode(payload)
    }

    /// Feed inbound bytes, routing every frame they complete.
    ///
    /// Returns the number of frames decoded and handed to the router. A
    /// malformed payload drops that one frame and continues with the next;
    /// connection-fatal errors propagate so the transport can close the
    /// connection.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::BadMagic`], [`ProtocolError::BadVersion`], or
    /// [`ProtocolError::FrameTooLarge`] — all connection-fatal.
    pub fn on_bytes(&mut self, bytes: &[u8]) -> Result<usize, ProtocolError> {
        self.decoder.feed(bytes);
        let mut routed = 0;
        loop {
            match self.decoder.poll_frame() {
                Ok(Some(frame)) => {
                    let _ = self.router.route(self.id, frame);
                    routed += 1;
                }
                Ok(None) => break,
                Err(err) if err.is_connection_fatal() => return Err(err),
                Err(err) => {
                    warn!(conn = %self.id, %err, "dropping malformed frame");
                }
            }
        }
        Ok(routed)
    }

    /// Discard all per-connection state on close.
    pub fn on_close(&mut self) {
        self.router.tokens().forget_connection(self.id);
        self.decoder.reset();
        debug!(conn = %self.id, "connection state discarded");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
