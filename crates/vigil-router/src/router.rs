//! Response routing: attribute merge, registry lookup, handler dispatch.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, instrument, trace};
use vigil_core::ConnectionId;

use crate::dispatch::{DispatchJob, DispatchPool};
use crate::registry::RoutingRegistry;
use crate::tokens::SessionTokenStore;

/// Reserved top-level response field carrying the bulk payload.
///
/// Its value is a nested collection consumed by application code; it never
/// participates in routing.
pub const BULK_PAYLOAD_FIELD: &str = "data";

/// Routes decoded responses to every registered handler whose key matches.
///
/// Routing attributes are the session tokens captured from the originating
/// request merged with the response's top-level scalar fields (tokens
/// preferential, bulk payload excluded). Dispatch happens on the bounded
/// worker pool; the caller — the I/O context — never waits on handler code.
pub struct ResponseRouter {
    registry: Arc<RoutingRegistry>,
    tokens: Arc<SessionTokenStore>,
    pool: DispatchPool,
}

impl ResponseRouter {
    /// Create a router over a shared registry and token store.
    ///
    /// Must be called from within a Tokio runtime (the dispatch pool
    /// spawns its drain task immediately).
    #[must_use]
    pub fn new(
        registry: Arc<RoutingRegistry>,
        tokens: Arc<SessionTokenStore>,
        dispatch_workers: usize,
        dispatch_queue_depth: usize,
    ) -> Self {
        Self {
            registry,
            tokens,
            pool: DispatchPool::new(dispatch_workers, dispatch_queue_depth),
        }
    }

    /// Route one decoded inbound response.
    ///
    /// Consumes the connection's session tokens (single-use), merges them
    /// with the response's routable fields, and schedules one dispatch per
    /// (matched key, handler) pair. A response with no routable attributes
    /// or no matching key is dropped silently. Returns the number of
    /// dispatches scheduled.
    #[instrument(skip(self, response), fields(conn = %conn))]
    pub fn route(&self, conn: ConnectionId, response: Value) -> usize {
        let mut attributes = Map::new();
        if let Some(stored) = self.tokens.take(conn) {
            for (name, value) in stored {
                let _ = attributes.insert(name, value);
            }
        }
        if let Some(object) = response.as_object() {
            for (name, value) in object {
                if name == BULK_PAYLOAD_FIELD || attributes.contains_key(name) {
                    continue;
                }
                let _ = attributes.insert(name.clone(), value.clone());
            }
        }
        if attributes.is_empty() {
            debug!("response carries no routable attributes, dropping");
            return 0;
        }

        let matches = match self.registry.lookup(&attributes) {
            Ok(matches) => matches,
            Err(err) => {
                debug!(%err, "unroutable response dropped");
                return 0;
            }
        };
        if matches.is_empty() {
            trace!("no registered key matches response attributes");
            return 0;
        }

        let response = Arc::new(response);
        let mut scheduled = 0;
        for matched in matches {
            for handler in matched.handlers {
                let submitted = self.pool.submit(DispatchJob {
                    key: matched.key.clone(),
                    handler,
                    response: Arc::clone(&response),
                });
                if submitted {
                    scheduled += 1;
                }
            }
        }
        trace!(scheduled, "response dispatched");
        scheduled
    }

    /// The shared routing registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<RoutingRegistry> {
        &self.registry
    }

    /// The shared session token store.
    #[must_use]
    pub fn tokens(&self) -> &Arc<SessionTokenStore> {
        &self.tokens
    }

    /// Dispatches dropped because the worker queue was full.
    #[must_use]
    pub fn dropped_dispatches(&self) -> u64 {
        self.pool.dropped()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
