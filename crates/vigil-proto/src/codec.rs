//! `tokio_util::codec` adapter for framed transports.
//!
//! [`VigilCodec`] wraps the same header logic as [`crate::FrameDecoder`]
//! behind the [`Decoder`]/[`Encoder`] traits so it can be used with
//! `tokio_util::codec::Framed` over a TCP stream. Header validation is
//! eager: a bad magic marker or version byte is reported as soon as those
//! bytes are present, without waiting for the rest of the frame.

use bytes::{Buf, BufMut, BytesMut};
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder};
use vigil_core::{
    DEFAULT_MAX_FRAME_LEN, FRAME_HEADER_LEN, FRAME_MAGIC, PROTOCOL_VERSION, ProtocolError,
};

use crate::payload::{OutboundPayload, write_header};

/// Frame codec for `tokio_util::codec::Framed` transports.
///
/// One codec instance per connection; it holds no cross-connection state.
#[derive(Clone, Debug)]
pub struct VigilCodec {
    version: u8,
    max_frame_len: u64,
}

impl Default for VigilCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl VigilCodec {
    /// Create a codec expecting [`PROTOCOL_VERSION`] with the default
    /// frame-length cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(PROTOCOL_VERSION, DEFAULT_MAX_FRAME_LEN)
    }

    /// Create a codec with an explicit expected version and length cap.
    #[must_use]
    pub fn with_limits(version: u8, max_frame_len: u64) -> Self {
        Self {
            version,
            max_frame_len,
        }
    }
}

impl Decoder for VigilCodec {
    type Item = Value;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Value>, ProtocolError> {
        if src.len() < FRAME_MAGIC.len() {
            src.reserve(FRAME_HEADER_LEN - src.len());
            return Ok(None);
        }
        let mut found = [0u8; 4];
        found.copy_from_slice(&src[0..4]);
        if found != FRAME_MAGIC {
            return Err(ProtocolError::BadMagic {
                expected: FRAME_MAGIC,
                found,
            });
        }
        if src.len() < 5 {
            src.reserve(FRAME_HEADER_LEN - src.len());
            return Ok(None);
        }
        if src[4] != self.version {
            return Err(ProtocolError::BadVersion {
                expected: self.version,
                found: src[4],
            });
        }
        if src.len() < FRAME_HEADER_LEN {
            src.reserve(FRAME_HEADER_LEN - src.len());
            return Ok(None);
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&src[5..FRAME_HEADER_LEN]);
        let declared = u64::from_le_bytes(len_bytes);
        if declared > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                declared,
                max: self.max_frame_len,
            });
        }
        let expected = usize::try_from(declared).map_err(|_| ProtocolError::FrameTooLarge {
            declared,
            max: self.max_frame_len,
        })?;
        let total = FRAME_HEADER_LEN + expected;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        src.advance(FRAME_HEADER_LEN);
        let payload = src.split_to(expected);
        Ok(Some(serde_json::from_slice(&payload)?))
    }
}

impl Encoder<OutboundPayload> for VigilCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: OutboundPayload, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let body = item.body_bytes()?;
        dst.reserve(FRAME_HEADER_LEN + body.len());
        write_header(dst, body.len() as u64);
        dst.put_slice(&body);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn encoded(value: &Value) -> BytesMut {
        let mut codec = VigilCodec::new();
        let mut dst = BytesMut::new();
        codec
            .encode(OutboundPayload::Json(value.clone()), &mut dst)
            .unwrap();
        dst
    }

    #[test]
    fn encode_decode_round_trip() {
        let value = json!({"response": "success", "data": [{"key": "v"}]});
        let mut src = encoded(&value);
        let mut codec = VigilCodec::new();
        assert_eq!(codec.decode(&mut src).unwrap().unwrap(), value);
        assert!(src.is_empty());
    }

    #[test]
    fn partial_header_requests_more() {
        let full = encoded(&json!({"a": 1}));
        let mut codec = VigilCodec::new();
        let mut src = BytesMut::from(&full[..3]);
        assert!(codec.decode(&mut src).unwrap().is_none());
        src.extend_from_slice(&full[3..]);
        assert!(codec.decode(&mut src).unwrap().is_some());
    }

    #[test]
    fn bad_magic_detected_from_first_bytes() {
        let mut codec = VigilCodec::new();
        let mut src = BytesMut::from(&b"HTTP"[..]);
        assert_matches!(
            codec.decode(&mut src).unwrap_err(),
            ProtocolError::BadMagic { .. }
        );
    }

    #[test]
    fn bad_version_detected_before_length() {
        let mut codec = VigilCodec::new();
        let mut src = BytesMut::new();
        src.put_slice(&FRAME_MAGIC);
        src.put_u8(200);
        assert_matches!(
            codec.decode(&mut src).unwrap_err(),
            ProtocolError::BadVersion { found: 200, .. }
        );
    }

    #[test]
    fn oversize_frame_rejected() {
        let mut codec = VigilCodec::with_limits(PROTOCOL_VERSION, 8);
        let mut src = BytesMut::new();
        src.put_slice(&FRAME_MAGIC);
        src.put_u8(PROTOCOL_VERSION);
        src.put_u64_le(9);
        assert_matches!(
            codec.decode(&mut src).unwrap_err(),
            ProtocolError::FrameTooLarge { declared: 9, max: 8 }
        );
    }

    #[test]
    fn two_frames_in_one_buffer() {
        let mut src = encoded(&json!({"seq": 1}));
        src.extend_from_slice(&encoded(&json!({"seq": 2})));
        let mut codec = VigilCodec::new();
        assert_eq!(codec.decode(&mut src).unwrap().unwrap(), json!({"seq": 1}));
        assert_eq!(codec.decode(&mut src).unwrap().unwrap(), json!({"seq": 2}));
        assert!(codec.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn file_region_encode_is_rejected() {
        use crate::payload::FileRegion;
        let mut codec = VigilCodec::new();
        let mut dst = BytesMut::new();
        let err = codec
            .encode(
                OutboundPayload::FileRegion(FileRegion {
                    path: "/tmp/blob".into(),
                    offset: 0,
                    len: 10,
                }),
                &mut dst,
            )
            .unwrap_err();
        assert_matches!(err, ProtocolError::UnsupportedPayloadKind { .. });
    }
}
