//! Single-generation read-through cache for path resolution.

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct CacheInner {
    generation: String,
    paths: HashMap<String, String>,
}

/// Caches path→node-id lookups for one snapshot generation.
///
/// The generation is the hex hash of the last persisted snapshot; any
/// mutation that reaches the disk changes it and implicitly invalidates
/// every cached path.
#[derive(Debug, Default)]
pub struct PathCache {
    inner: RwLock<CacheInner>,
}

impl PathCache {
    /// Fresh, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached node id for `path`, if the cache is on `generation`.
    pub fn get(&self, generation: &str, path: &str) -> Option<String> {
        let inner = self.inner.read().expect("cache lock poisoned");
        if inner.generation != generation {
            return None;
        }
        inner.paths.get(path).cloned()
    }

    /// Record a resolution under `generation`, dropping entries from any
    /// older generation.
    pub fn insert(&self, generation: &str, path: &str, node_id: &str) {
        let mut inner = self.inner.write().expect("cache lock poisoned");
        if inner.generation != generation {
            inner.generation = generation.to_owned();
            inner.paths.clear();
        }
        inner.paths.insert(path.to_owned(), node_id.to_owned());
    }

    /// Number of cached paths in the current generation.
    pub fn len(&self) -> usize {
        self.inner.read().expect("cache lock poisoned").paths.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
