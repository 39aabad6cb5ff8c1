//! Outbound payload kinds and frame encoding.

use std::path::PathBuf;

use bytes::{BufMut, Bytes, BytesMut};
use vigil_core::{FRAME_HEADER_LEN, FRAME_MAGIC, PROTOCOL_VERSION, ProtocolError};

/// A large payload transferred by reference rather than by copy.
///
/// The codec emits only the frame header for a file region; the transport
/// streams the `len` bytes starting at `offset` directly after it
/// (zero-copy via `sendfile` or equivalent).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRegion {
    /// File backing the payload.
    pub path: PathBuf,
    /// Byte offset of the region within the file.
    pub offset: u64,
    /// Region length in bytes; becomes the frame's declared length.
    pub len: u64,
}

/// Payload kinds accepted by [`encode`].
///
/// Anything else is unrepresentable by construction. A [`FileRegion`]
/// asked to fully materialise fails with
/// [`ProtocolError::UnsupportedPayloadKind`]; use
/// [`encode_file_region_header`] for it instead.
#[derive(Clone, Debug)]
pub enum OutboundPayload {
    /// A JSON document, serialized to UTF-8 text at encode time.
    Json(serde_json::Value),
    /// Pre-rendered UTF-8 text (typically already-serialized JSON).
    Text(String),
    /// Raw bytes forwarded verbatim.
    Raw(Bytes),
    /// A large body streamed by the transport after the header.
    FileRegion(FileRegion),
}

impl OutboundPayload {
    /// Short name of the payload kind, for errors and logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::Text(_) => "text",
            Self::Raw(_) => "raw",
            Self::FileRegion(_) => "file-region",
        }
    }

    /// Materialise the payload body as bytes.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::UnsupportedPayloadKind`] for a file region, whose
    /// body lives on disk and is streamed by the transport.
    pub fn body_bytes(&self) -> Result<Bytes, ProtocolError> {
        match self {
            Self::Json(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
            Self::Text(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
            Self::Raw(bytes) => Ok(bytes.clone()),
            Self::FileRegion(_) => Err(ProtocolError::UnsupportedPayloadKind {
                kind: self.kind(),
            }),
        }
    }
}

impl From<serde_json::Value> for OutboundPayload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for OutboundPayload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Bytes> for OutboundPayload {
    fn from(bytes: Bytes) -> Self {
        Self::Raw(bytes)
    }
}

/// Write the 13-byte frame header for a payload of `len` bytes.
pub(crate) fn write_header(dst: &mut BytesMut, len: u64) {
    dst.put_slice(&FRAME_MAGIC);
    dst.put_u8(PROTOCOL_VERSION);
    dst.put_u64_le(len);
}

/// Encode an outbound payload into one complete wire frame.
///
/// Writes magic, version, little-endian length, then the payload bytes
/// verbatim.
///
/// # Errors
///
/// [`ProtocolError::UnsupportedPayloadKind`] for a [`FileRegion`];
/// [`ProtocolError::MalformedPayload`] if JSON serialization fails.
pub fn encode(payload: &OutboundPayload) -> Result<Bytes, ProtocolError> {
    let body = payload.body_bytes()?;
    let mut dst = BytesMut::with_capacity(FRAME_HEADER_LEN + body.len());
    write_header(&mut dst, body.len() as u64);
    dst.put_slice(&body);
    Ok(dst.freeze())
}

/// Encode only the frame header for a [`FileRegion`].
///
/// The transport must stream exactly `region.len` bytes of the file
/// directly after these header bytes; the receiver sees an ordinary frame.
#[must_use]
pub fn encode_file_region_header(region: &FileRegion) -> Bytes {
    let mut dst = BytesMut::with_capacity(FRAME_HEADER_LEN);
    write_header(&mut dst, region.len);
    dst.freeze()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn encode_json_layout() {
        let frame = encode(&OutboundPayload::Json(json!({"a": 1}))).unwrap();
        assert_eq!(&frame[0..4], b"VGLP");
        assert_eq!(frame[4], PROTOCOL_VERSION);
        let body = &frame[FRAME_HEADER_LEN..];
        let declared = u64::from_le_bytes(frame[5..13].try_into().unwrap());
        assert_eq!(declared, body.len() as u64);
        let parsed: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(parsed, json!({"a": 1}));
    }

    #[test]
    fn encode_text_verbatim() {
        let frame = encode(&OutboundPayload::Text("{\"k\":true}".to_owned())).unwrap();
        assert_eq!(&frame[FRAME_HEADER_LEN..], b"{\"k\":true}");
    }

    #[test]
    fn encode_raw_verbatim() {
        let raw = Bytes::from_static(&[0x00, 0xff, 0x7f]);
        let frame = encode(&OutboundPayload::Raw(raw)).unwrap();
        assert_eq!(&frame[FRAME_HEADER_LEN..], &[0x00, 0xff, 0x7f]);
        let declared = u64::from_le_bytes(frame[5..13].try_into().unwrap());
        assert_eq!(declared, 3);
    }

    #[test]
    fn encode_empty_text() {
        let frame = encode(&OutboundPayload::Text(String::new())).unwrap();
        assert_eq!(frame.len(), FRAME_HEADER_LEN);
        let declared = u64::from_le_bytes(frame[5..13].try_into().unwrap());
        assert_eq!(declared, 0);
    }

    #[test]
    fn encode_file_region_is_unsupported() {
        let region = FileRegion {
            path: PathBuf::from("/var/lib/vigil/export.bin"),
            offset: 0,
            len: 1 << 30,
        };
        let err = encode(&OutboundPayload::FileRegion(region)).unwrap_err();
        assert_matches!(
            err,
            ProtocolError::UnsupportedPayloadKind { kind: "file-region" }
        );
    }

    #[test]
    fn file_region_header_declares_region_len() {
        let region = FileRegion {
            path: PathBuf::from("/var/lib/vigil/export.bin"),
            offset: 4096,
            len: 987_654,
        };
        let header = encode_file_region_header(&region);
        assert_eq!(header.len(), FRAME_HEADER_LEN);
        assert_eq!(&header[0..4], b"VGLP");
        let declared = u64::from_le_bytes(header[5..13].try_into().unwrap());
        assert_eq!(declared, 987_654);
    }

    #[test]
    fn payload_kind_names() {
        assert_eq!(OutboundPayload::Json(json!(null)).kind(), "json");
        assert_eq!(OutboundPayload::Text(String::new()).kind(), "text");
        assert_eq!(OutboundPayload::Raw(Bytes::new()).kind(), "raw");
    }
}
