//! # vigil-router
//!
//! Response correlation and routing for the Vigil monitoring agent.
//!
//! Many logical requests share one connection, and responses can arrive out
//! of order or enriched by intermediate hops. This crate correlates each
//! decoded response back to the handlers that asked for it:
//!
//! - [`SessionTokenStore`]: per-connection, single-use capture of watched
//!   attributes from the most recently sent request
//! - [`RoutingKey`]: immutable attribute-based identifier with wildcard
//!   pattern-matching equality
//! - [`RoutingRegistry`]: process-wide interning catalog of routing keys and
//!   their registered handlers
//! - [`ResponseRouter`]: merges session tokens with response fields, looks
//!   up matching keys, and dispatches to handlers on a bounded worker pool
//! - [`ConnectionContext`]: per-connection glue tying decode, token capture,
//!   and routing together
//!
//! The registry and token store are shared across connections and use
//! lock-striped maps; handler dispatch is the single mandatory concurrency
//! boundary and never runs on the I/O context.

#![deny(unsafe_code)]

pub mod connection;
pub mod dispatch;
pub mod registry;
pub mod router;
pub mod routing_key;
pub mod tokens;

pub use connection::ConnectionContext;
pub use dispatch::DispatchPool;
pub use registry::{HandlerId, ResponseHandler, RouteMatch, RoutingRegistry};
pub use router::{BULK_PAYLOAD_FIELD, ResponseRouter};
pub use routing_key::RoutingKey;
pub use tokens::SessionTokenStore;
