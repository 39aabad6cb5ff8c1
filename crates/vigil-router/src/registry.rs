//! Process-wide catalog of interned routing keys and their handlers.
//!
//! The registry is constructed once at startup and passed by `Arc` to every
//! component that needs it — explicit injection instead of a hidden global.
//! Entries are interned by canonical form, so constructing a key from the
//! same attributes in any insertion order always lands on the same entry
//! and repeated registration of identical interest never duplicates state.
//!
//! Eviction policy: an entry whose handler set is emptied by
//! [`RoutingRegistry::unregister`] is removed from the registry, bounding
//! memory under handler churn. A key interned with no handlers (for
//! diagnostics) is retained until an unregister empties it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::debug;
use vigil_core::RoutingError;

use crate::routing_key::RoutingKey;

/// A registered response callback.
///
/// Handlers are shared across threads and invoked on the dispatch pool,
/// never on the I/O context. Multiple handlers may be registered under the
/// same routing key; they observe the same immutable response and run
/// independently, in no guaranteed order.
pub trait ResponseHandler: Send + Sync + 'static {
    /// Called once per matched routing key when a response arrives.
    fn on_response(&self, key: &RoutingKey, response: &Value);
}

/// Opaque registration id returned by [`RoutingRegistry::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler_{}", self.0)
    }
}

/// One interned routing key with its registered handler set.
struct RegistryEntry {
    key: RoutingKey,
    handlers: RwLock<HashMap<HandlerId, Arc<dyn ResponseHandler>>>,
}

/// One lookup hit: the matched interned key and its handlers at match time.
pub struct RouteMatch {
    /// The interned key that matched.
    pub key: RoutingKey,
    /// Handlers registered under that key.
    pub handlers: Vec<Arc<dyn ResponseHandler>>,
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("key", &self.key)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Thread-safe interning catalog of routing keys.
pub struct RoutingRegistry {
    entries: DashMap<String, Arc<RegistryEntry>>,
    registrations: DashMap<HandlerId, Vec<String>>,
    next_id: AtomicU64,
}

impl Default for RoutingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            registrations: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Intern a routing key, reusing an existing entry with the same
    /// canonical form. Returns the interned key.
    pub fn intern(&self, key: RoutingKey) -> RoutingKey {
        self.intern_entry(key).key.clone()
    }

    fn intern_entry(&self, key: RoutingKey) -> Arc<RegistryEntry> {
        self.entries
            .entry(key.canonical().to_owned())
            .or_insert_with(|| {
                Arc::new(RegistryEntry {
                    key,
                    handlers: RwLock::new(HashMap::new()),
                })
            })
            .clone()
    }

    /// Register a handler under each of the given routing keys.
    ///
    /// Keys are canonicalized and interned; registering identical interest
    /// twice adds the handler to the same entries rather than growing the
    /// registry. Returns an id for later [`Self::unregister`].
    ///
    /// # Errors
    ///
    /// [`RoutingError::InvalidRoutingKey`] if `keys` is empty; no partial
    /// state is left behind.
    pub fn register(
        &self,
        handler: Arc<dyn ResponseHandler>,
        keys: Vec<RoutingKey>,
    ) -> Result<HandlerId, RoutingError> {
        if keys.is_empty() {
            return Err(RoutingError::InvalidRoutingKey {
                reason: "handler declares no routing keys".to_owned(),
            });
        }
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut canonical = Vec::with_capacity(keys.len());
        for key in keys {
            // Insert while the shard guard is held: a concurrent unregister
            // emptying this entry must not evict it between interning and
            // attaching the handler.
            let entry = self
                .entries
                .entry(key.canonical().to_owned())
                .or_insert_with(|| {
                    Arc::new(RegistryEntry {
                        key,
                        handlers: RwLock::new(HashMap::new()),
                    })
                });
            let _ = entry.handlers.write().insert(id, Arc::clone(&handler));
            canonical.push(entry.key.canonical().to_owned());
        }
        canonical.sort_unstable();
        canonical.dedup();
        debug!(%id, keys = canonical.len(), "handler registered");
        let _ = self.registrations.insert(id, canonical);
        Ok(id)
    }

    /// Remove a handler from every key it was registered under.
    ///
    /// Entries whose handler set this call empties are evicted from the
    /// registry. Unknown ids are ignored.
    pub fn unregister(&self, id: HandlerId) {
        let Some((_, canonical)) = self.registrations.remove(&id) else {
            return;
        };
        for form in canonical {
            let emptied = match self.entries.get(&form) {
                Some(entry) => {
                    let mut handlers = entry.handlers.write();
                    handlers.remove(&id).is_some() && handlers.is_empty()
                }
                None => false,
            };
            if emptied {
                let _ = self
                    .entries
                    .remove_if(&form, |_, entry| entry.handlers.read().is_empty());
            }
        }
        debug!(%id, "handler unregistered");
    }

    /// Look up every registered key matching the given attribute map.
    ///
    /// Builds a concrete key from the map and returns each interned key
    /// equal to it under pattern semantics, together with its handlers.
    ///
    /// # Errors
    ///
    /// [`RoutingError::InvalidRoutingKey`] if the map holds no routable
    /// attribute.
    pub fn lookup(&self, attributes: &Map<String, Value>) -> Result<Vec<RouteMatch>, RoutingError> {
        let key = RoutingKey::from_json_attributes(attributes)?;
        Ok(self.lookup_key(&key))
    }

    /// Look up every registered key matching `key` under pattern semantics.
    ///
    /// Symmetric: a registered pattern matches a concrete lookup key, and a
    /// registered concrete key can be looked up by a pattern.
    #[must_use]
    pub fn lookup_key(&self, key: &RoutingKey) -> Vec<RouteMatch> {
        self.entries
            .iter()
            .filter(|entry| entry.key.matches(key))
            .map(|entry| RouteMatch {
                key: entry.key.clone(),
                handlers: entry.handlers.read().values().cloned().collect(),
            })
            .collect()
    }

    /// Number of interned keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    struct CountingHandler {
        calls: AtomicUsize,
    }

    impl CountingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ResponseHandler for CountingHandler {
        fn on_response(&self, _key: &RoutingKey, _response: &Value) {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn exact(pairs: &[(&str, &str)]) -> RoutingKey {
        RoutingKey::exact(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned())),
        )
        .unwrap()
    }

    #[test]
    fn interning_deduplicates_by_canonical_form() {
        let registry = RoutingRegistry::new();
        let a = registry.intern(exact(&[("host", "srv1"), ("request", "ping")]));
        let b = registry.intern(exact(&[("request", "ping"), ("host", "srv1")]));
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_requires_at_least_one_key() {
        let registry = RoutingRegistry::new();
        let err = registry
            .register(CountingHandler::new(), Vec::new())
            .unwrap_err();
        assert_matches!(err, RoutingError::InvalidRoutingKey { .. });
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_registration_does_not_grow_registry() {
        let registry = RoutingRegistry::new();
        let handler = CountingHandler::new();
        let key = exact(&[("host", "srv1")]);
        let id1 = registry
            .register(handler.clone(), vec![key.clone()])
            .unwrap();
        let id2 = registry.register(handler, vec![key]).unwrap();
        assert_ne!(id1, id2);
        assert_eq!(registry.len(), 1);
        let matches = registry.lookup_key(&exact(&[("host", "srv1")]));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].handlers.len(), 2);
    }

    #[test]
    fn lookup_matches_registered_pattern() {
        let registry = RoutingRegistry::new();
        let pattern = RoutingKey::pattern(
            vec![("host".to_owned(), "srv1".to_owned())],
            true,
        )
        .unwrap();
        let _ = registry
            .register(CountingHandler::new(), vec![pattern])
            .unwrap();

        let obj = json!({"host": "srv1", "response": "success"});
        let matches = registry.lookup(obj.as_object().unwrap()).unwrap();
        assert_eq!(matches.len(), 1);

        let other = json!({"host": "srv2"});
        assert!(registry.lookup(other.as_object().unwrap()).unwrap().is_empty());
    }

    #[test]
    fn lookup_by_pattern_finds_concrete_key() {
        let registry = RoutingRegistry::new();
        let _ = registry
            .register(
                CountingHandler::new(),
                vec![exact(&[("host", "srv1"), ("kind", "cpu")])],
            )
            .unwrap();
        let probe = RoutingKey::pattern(vec![("host".to_owned(), "srv1".to_owned())], true).unwrap();
        assert_eq!(registry.lookup_key(&probe).len(), 1);
    }

    #[test]
    fn lookup_on_empty_map_is_invalid() {
        let registry = RoutingRegistry::new();
        let err = registry.lookup(&Map::new()).unwrap_err();
        assert_matches!(err, RoutingError::InvalidRoutingKey { .. });
    }

    #[test]
    fn unregister_evicts_emptied_entries() {
        let registry = RoutingRegistry::new();
        let id = registry
            .register(CountingHandler::new(), vec![exact(&[("host", "srv1")])])
            .unwrap();
        assert_eq!(registry.len(), 1);
        registry.unregister(id);
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_keeps_entries_with_other_handlers() {
        let registry = RoutingRegistry::new();
        let key = exact(&[("host", "srv1")]);
        let id1 = registry
            .register(CountingHandler::new(), vec![key.clone()])
            .unwrap();
        let _id2 = registry
            .register(CountingHandler::new(), vec![key.clone()])
            .unwrap();
        registry.unregister(id1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup_key(&key)[0].handlers.len(), 1);
    }

    #[test]
    fn unregister_unknown_id_is_ignored() {
        let registry = RoutingRegistry::new();
        registry.unregister(HandlerId(999));
        assert!(registry.is_empty());
    }

    #[test]
    fn interned_key_without_handlers_is_still_matched() {
        let registry = RoutingRegistry::new();
        let _ = registry.intern(exact(&[("host", "srv1")]));
        let matches = registry.lookup_key(&exact(&[("host", "srv1")]));
        assert_eq!(matches.len(), 1);
        assert!(matches[0].handlers.is_empty());
    }

    #[test]
    fn route_match_debug_reports_handler_count() {
        let registry = RoutingRegistry::new();
        let _ = registry
            .register(CountingHandler::new(), vec![exact(&[("host", "srv1")])])
            .unwrap();
        let matches = registry.lookup_key(&exact(&[("host", "srv1")]));
        let rendered = format!("{:?}", matches[0]);
        assert!(rendered.contains("vigil:host=srv1"));
        assert!(rendered.contains("handlers: 1"));
    }

    #[test]
    fn register_visible_to_lookup_despite_concurrent_unregister() {
        let registry = Arc::new(RoutingRegistry::new());
        let key = exact(&[("host", "srv1")]);
        let mut threads = Vec::new();
        for _ in 0..2 {
            let registry = Arc::clone(&registry);
            let key = key.clone();
            threads.push(std::thread::spawn(move || {
                for _ in 0..500 {
                    let id = registry
                        .register(CountingHandler::new(), vec![key.clone()])
                        .unwrap();
                    let matches = registry.lookup_key(&key);
                    assert!(
                        matches.iter().any(|m| !m.handlers.is_empty()),
                        "freshly registered handler must be visible to lookup"
                    );
                    registry.unregister(id);
                }
            }));
        }
        for thread in threads {
            thread.join().unwrap();
        }
        // The last unregister to empty the entry evicts it.
        assert!(registry.is_empty());
    }

    #[test]
    fn handlers_under_same_key_receive_independent_calls() {
        let registry = RoutingRegistry::new();
        let first = CountingHandler::new();
        let second = CountingHandler::new();
        let key = exact(&[("host", "srv1")]);
        let _ = registry.register(first.clone(), vec![key.clone()]).unwrap();
        let _ = registry.register(second.clone(), vec![key.clone()]).unwrap();

        let response = json!({"host": "srv1"});
        for m in registry.lookup_key(&key) {
            for handler in m.handlers {
                handler.on_response(&m.key, &response);
            }
        }
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }
}
