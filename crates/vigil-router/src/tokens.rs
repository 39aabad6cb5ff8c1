//! Per-connection session-token capture and injection.
//!
//! A session token is a value captured from an outbound request (e.g. a
//! host identifier) and reattached to, or used to route, the corresponding
//! inbound response. Tokens apply to exactly one response per request: the
//! stored map is consumed by the next inbound response on the connection
//! and cleared unconditionally, enforcing strict request/response pairing.
//!
//! Known limitation (preserved from the protocol, not fixed here): the
//! wire format carries no multiplexing id, so a connection that pipelines
//! multiple outstanding requests before reading a response will have tokens
//! misattributed to the first response that arrives.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, trace};
use vigil_core::ConnectionId;

/// Shared store mapping connection ids to captured token maps.
///
/// The outer map is lock-striped and safe for concurrent use; each
/// connection's entry is only ever written by the I/O context that owns
/// that connection's events.
pub struct SessionTokenStore {
    watched: Arc<[String]>,
    tokens: DashMap<ConnectionId, HashMap<String, Value>>,
}

impl SessionTokenStore {
    /// Create a store watching the given attribute names (case-sensitive).
    pub fn new(watched: impl IntoIterator<Item = String>) -> Self {
        Self {
            watched: watched.into_iter().collect(),
            tokens: DashMap::new(),
        }
    }

    /// The watched attribute names.
    #[must_use]
    pub fn watched(&self) -> &[String] {
        &self.watched
    }

    /// Record watched keys present in an outbound request body.
    ///
    /// Returns the number of keys captured; when non-zero the caller is
    /// responsible for clearing the connection's entry on close (via
    /// [`Self::forget_connection`]) if no response ever arrives.
    pub fn capture_outbound(&self, conn: ConnectionId, body: &Value) -> usize {
        let Some(object) = body.as_object() else {
            return 0;
        };
        let mut captured = 0;
        for name in self.watched.iter() {
            if let Some(value) = object.get(name) {
                let _ = self
                    .tokens
                    .entry(conn)
                    .or_default()
                    .insert(name.clone(), value.clone());
                captured += 1;
            }
        }
        if captured > 0 {
            trace!(%conn, captured, "session tokens captured from outbound request");
        }
        captured
    }

    /// Remove and return the stored token map for a connection.
    ///
    /// Single-use: a second call without a new captured request returns
    /// `None`.
    #[must_use]
    pub fn take(&self, conn: ConnectionId) -> Option<HashMap<String, Value>> {
        self.tokens.remove(&conn).map(|(_, map)| map)
    }

    /// Copy stored tokens into an inbound response object.
    ///
    /// Each token is copied only where the response lacks the key, so a
    /// server-supplied value always wins over an injected one. The stored
    /// map is cleared unconditionally, even when the response is not an
    /// object. Returns the number of keys injected.
    pub fn inject_inbound(&self, conn: ConnectionId, body: &mut Value) -> usize {
        let Some(stored) = self.take(conn) else {
            return 0;
        };
        let Some(object) = body.as_object_mut() else {
            debug!(%conn, "inbound payload is not an object, tokens discarded");
            return 0;
        };
        let mut injected = 0;
        for (name, value) in stored {
            if !object.contains_key(&name) {
                let _ = object.insert(name, value);
                injected += 1;
            }
        }
        trace!(%conn, injected, "session tokens injected into response");
        injected
    }

    /// Whether any tokens are stored for a connection.
    #[must_use]
    pub fn has_tokens(&self, conn: ConnectionId) -> bool {
        self.tokens.contains_key(&conn)
    }

    /// Drop any stored tokens for a closed connection.
    pub fn forget_connection(&self, conn: ConnectionId) {
        if self.tokens.remove(&conn).is_some() {
            debug!(%conn, "session tokens discarded on connection close");
        }
    }

    /// Number of connections with stored tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no connection has stored tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
