//! Error hierarchy for the Vigil agent core.
//!
//! Provides a structured error type system built on [`thiserror`]:
//!
//! - [`VigilError`]: Top-level enum covering all error domains
//! - [`ProtocolError`]: Wire-format faults (bad magic/version, malformed
//!   payload, unsupported encode input)
//! - [`RoutingError`]: Routing-key and dispatch faults
//!
//! Propagation policy: framing errors surface to the transport layer, which
//! decides whether to close the connection. Routing and dispatch errors are
//! contained inside the router and never reach the transport or sibling
//! handlers. No error in this hierarchy terminates the process.

use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// ProtocolError — framing faults
// ─────────────────────────────────────────────────────────────────────────────

/// Wire-protocol framing error.
///
/// `BadMagic`, `BadVersion`, and `FrameTooLarge` are fatal to the
/// connection's frame stream; `MalformedPayload` is fatal to one frame
/// only; `UnsupportedPayloadKind` is a usage error on encode.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The first four bytes of a frame did not match the protocol marker.
    #[error("bad magic marker: expected {expected:?}, found {found:?}")]
    BadMagic {
        /// The marker this agent expects.
        expected: [u8; 4],
        /// The bytes actually read.
        found: [u8; 4],
    },

    /// The version byte did not match the configured protocol version.
    #[error("protocol version mismatch: expected {expected}, found {found}")]
    BadVersion {
        /// The version this agent speaks.
        expected: u8,
        /// The version byte actually read.
        found: u8,
    },

    /// The declared payload length exceeds the configured cap.
    #[error("declared frame length {declared} exceeds maximum {max}")]
    FrameTooLarge {
        /// Length field from the frame header.
        declared: u64,
        /// Configured maximum payload length.
        max: u64,
    },

    /// A structurally valid frame carried a payload that is not valid JSON.
    #[error("malformed frame payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// `encode` was asked to materialise a payload kind it cannot.
    #[error("unsupported payload kind for encode: {kind}")]
    UnsupportedPayloadKind {
        /// Name of the offending payload kind.
        kind: &'static str,
    },

    /// Underlying transport I/O failure (framed-stream adapter only).
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether this error is fatal to the connection's frame stream.
    ///
    /// Fatal errors mean the decoder can no longer trust its position in
    /// the byte stream; the transport is expected to close the connection.
    /// A malformed payload leaves the stream aligned on the next frame.
    #[must_use]
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::BadMagic { .. } | Self::BadVersion { .. } | Self::FrameTooLarge { .. } | Self::Io(_)
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RoutingError — routing and dispatch faults
// ─────────────────────────────────────────────────────────────────────────────

/// Routing-key or handler-dispatch error.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A routing key was built from an empty or unusable attribute set.
    #[error("invalid routing key: {reason}")]
    InvalidRoutingKey {
        /// Why the key was rejected.
        reason: String,
    },

    /// A handler failed (returned an error or panicked) during dispatch.
    ///
    /// Logged and contained by the router; never propagated to sibling
    /// handlers or the I/O context.
    #[error("handler dispatch failure for key {key}: {detail}")]
    DispatchFailure {
        /// Canonical form of the matched routing key.
        key: String,
        /// Description of the failure.
        detail: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// VigilError — top-level error enum
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level error type for the Vigil agent core.
#[derive(Debug, Error)]
pub enum VigilError {
    /// Wire-protocol framing error.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// Routing or dispatch error.
    #[error("{0}")]
    Routing(#[from] RoutingError),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, VigilError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn bad_magic_display() {
        let err = ProtocolError::BadMagic {
            expected: *b"VGLP",
            found: *b"HTTP",
        };
        assert!(err.to_string().contains("bad magic marker"));
    }

    #[test]
    fn bad_version_display() {
        let err = ProtocolError::BadVersion {
            expected: 1,
            found: 9,
        };
        assert_eq!(
            err.to_string(),
            "protocol version mismatch: expected 1, found 9"
        );
    }

    #[test]
    fn magic_and_version_are_connection_fatal() {
        let magic = ProtocolError::BadMagic {
            expected: *b"VGLP",
            found: [0; 4],
        };
        let version = ProtocolError::BadVersion {
            expected: 1,
            found: 2,
        };
        assert!(magic.is_connection_fatal());
        assert!(version.is_connection_fatal());
    }

    #[test]
    fn malformed_payload_is_frame_local() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err = ProtocolError::MalformedPayload(json_err);
        assert!(!err.is_connection_fatal());
    }

    #[test]
    fn json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: ProtocolError = json_err.into();
        assert_matches!(err, ProtocolError::MalformedPayload(_));
    }

    #[test]
    fn top_level_wraps_both_domains() {
        let err: VigilError = ProtocolError::UnsupportedPayloadKind { kind: "file-region" }.into();
        assert_matches!(err, VigilError::Protocol(_));

        let err: VigilError = RoutingError::InvalidRoutingKey {
            reason: "empty attribute set".to_owned(),
        }
        .into();
        assert_matches!(err, VigilError::Routing(_));
    }

    #[test]
    fn dispatch_failure_display_names_key() {
        let err = RoutingError::DispatchFailure {
            key: "vigil:host=srv1".to_owned(),
            detail: "handler panicked".to_owned(),
        };
        assert!(err.to_string().contains("vigil:host=srv1"));
    }
}
