//! Process-wide registry of user filter handlers.
//!
//! The native callback signature can only carry an integer, so every custom
//! policy is registered here and referred to by id from then on. Entries are
//! never removed: the engine may keep an id for as long as the process lives.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// User-supplied filter logic.
///
/// Implementations run inline on engine threads during flushes, compactions
/// and reads, so they must be fast and must not block.
///
/// A handler's behavior and [`name`](FilterPolicyHandler::name) must stay
/// the same for as long as its id is registered. Filters written under one
/// name are read back under the same id, and nothing re-validates them.
pub trait FilterPolicyHandler: Send + Sync {
    /// Builds a filter summarizing `keys`.
    ///
    /// `keys` is ordered by the engine's comparator and may contain
    /// duplicates.
    fn create_filter(&self, keys: &[Vec<u8>]) -> Vec<u8>;

    /// Tests `key` against a filter returned by a previous
    /// [`create_filter`](FilterPolicyHandler::create_filter).
    ///
    /// Must return true for every key that was passed to that call. May
    /// return true for other keys, but should do so rarely.
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;

    /// Name of the policy. If the filter encoding changes incompatibly, the
    /// name must change too.
    fn name(&self) -> &str;
}

/// Thread-safe map from registry id to handler.
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<usize, Arc<dyn FilterPolicyHandler>>>,
    next_id: AtomicUsize,
}

impl HandlerRegistry {
    /// Creates an empty registry. The first id it hands out is 1.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
        }
    }

    /// The registry the callback bridge resolves ids against.
    pub fn global() -> &'static HandlerRegistry {
        static GLOBAL: OnceLock<HandlerRegistry> = OnceLock::new();
        GLOBAL.get_or_init(HandlerRegistry::new)
    }

    /// Stores `handler` and returns its new id.
    pub fn register(&self, handler: Arc<dyn FilterPolicyHandler>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().insert(id, handler);
        log::debug!("Registered filter handler {}", id);
        id
    }

    /// Returns the handler registered under `id`.
    pub fn lookup(&self, id: usize) -> Option<Arc<dyn FilterPolicyHandler>> {
        self.handlers.read().get(&id).cloned()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns true if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl FilterPolicyHandler for Named {
        fn create_filter(&self, _keys: &[Vec<u8>]) -> Vec<u8> {
            Vec::new()
        }

        fn key_may_match(&self, _key: &[u8], _filter: &[u8]) -> bool {
            true
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_ids_start_at_one() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());

        assert_eq!(registry.register(Arc::new(Named("first"))), 1);
        assert_eq!(registry.register(Arc::new(Named("second"))), 2);
        assert_eq!(registry.register(Arc::new(Named("third"))), 3);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_lookup() {
        let registry = HandlerRegistry::new();
        let a = registry.register(Arc::new(Named("a")));
        let b = registry.register(Arc::new(Named("b")));

        assert_eq!(registry.lookup(a).unwrap().name(), "a");
        assert_eq!(registry.lookup(b).unwrap().name(), "b");
        assert!(registry.lookup(0).is_none());
        assert!(registry.lookup(b + 1).is_none());
    }

    #[test]
    fn test_same_handler_registered_twice_gets_two_ids() {
        let registry = HandlerRegistry::new();
        let handler: Arc<dyn FilterPolicyHandler> = Arc::new(Named("shared"));

        let a = registry.register(Arc::clone(&handler));
        let b = registry.register(handler);
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }
}
