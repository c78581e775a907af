use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::frontend::ast::NodeId;
use crate::types::Type;

#[derive(Debug, Clone)]
struct Entry {
    value: Option<Type>,
    revision: u64,
}

/// Inferred types keyed by node, tagged with the project revision they were
/// computed at. Entries from an older revision are treated as missing and
/// dropped once a newer revision is inserted.
#[derive(Debug, Default)]
pub struct TypeCache {
    entries: RwLock<HashMap<NodeId, Entry>>,
    latest: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(value)` on a hit at `revision`; the value itself may be `None`.
    pub fn get(&self, node: NodeId, revision: u64) -> Option<Option<Type>> {
        let found = self
            .entries
            .read()
            .get(&node)
            .filter(|e| e.revision == revision)
            .map(|e| e.value.clone());
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, node: NodeId, revision: u64, value: Option<Type>) {
        let mut entries = self.entries.write();
        let latest = self.latest.load(Ordering::Relaxed);
        if revision < latest {
            return;
        }
        if revision > latest {
            entries.retain(|_, e| e.revision >= revision);
            self.latest.store(revision, Ordering::Relaxed);
        }
        entries.insert(node, Entry { value, revision });
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_revisions_miss() {
        let cache = TypeCache::new();
        let node = NodeId::from_index(3);
        assert_eq!(cache.get(node, 0), None);
        cache.insert(node, 0, Some(Type::String));
        assert_eq!(cache.get(node, 0), Some(Some(Type::String)));
        assert_eq!(cache.get(node, 1), None);
        cache.insert(node, 1, None);
        assert_eq!(cache.get(node, 1), Some(None));

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn newer_revision_evicts_older_entries() {
        let cache = TypeCache::new();
        let (a, b) = (NodeId::from_index(1), NodeId::from_index(2));
        cache.insert(a, 0, Some(Type::String));
        cache.insert(b, 0, Some(Type::Number));
        assert_eq!(cache.stats().entries, 2);

        cache.insert(b, 1, Some(Type::Bool));
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.get(a, 0), None);

        cache.insert(a, 0, Some(Type::String));
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.get(b, 1), Some(Some(Type::Bool)));
    }
}
