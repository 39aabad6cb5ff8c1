//! # vigil-core
//!
//! Foundation types, errors, branded IDs, and protocol constants for the
//! Vigil monitoring agent.
//!
//! This crate provides the shared vocabulary that all other Vigil crates
//! depend on:
//!
//! - **Branded IDs**: [`ConnectionId`] as a newtype for type safety
//! - **Protocol constants**: magic marker, protocol version, header layout
//! - **Errors**: [`VigilError`] hierarchy via `thiserror`, split into
//!   framing faults ([`ProtocolError`]) and routing faults ([`RoutingError`])

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod ids;

pub use constants::{
    DEFAULT_MAX_FRAME_LEN, FRAME_HEADER_LEN, FRAME_MAGIC, PROTOCOL_VERSION, ROUTING_DOMAIN,
};
pub use errors::{ProtocolError, Result, RoutingError, VigilError};
pub use ids::ConnectionId;
