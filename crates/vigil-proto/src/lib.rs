//! # vigil-proto
//!
//! Wire-protocol framing codec for the Vigil monitoring agent.
//!
//! Every message on the wire is one frame:
//!
//! ```text
//! offset  size  field
//! 0       4     magic marker ("VGLP")
//! 4       1     protocol version
//! 5       8     payload length, unsigned, little-endian
//! 13      N     payload bytes (UTF-8 JSON, or raw bytes for large transfers)
//! ```
//!
//! This crate provides:
//!
//! - [`OutboundPayload`] / [`FileRegion`]: the payload kinds [`encode`] accepts
//! - [`encode`] / [`encode_file_region_header`]: outbound frame construction
//! - [`FrameDecoder`]: a resumable, per-connection decode state machine that
//!   cooperatively suspends when fed fewer bytes than a frame needs
//! - [`VigilCodec`]: a `tokio_util::codec` adapter for framed transports
//!
//! Decoding fails closed: a magic or version mismatch is reported before any
//! payload byte is buffered, and the transport is expected to tear the
//! connection down on such a fault.

#![deny(unsafe_code)]

pub mod codec;
pub mod decoder;
pub mod payload;

pub use codec::VigilCodec;
pub use decoder::FrameDecoder;
pub use payload::{FileRegion, OutboundPayload, encode, encode_file_region_header};
