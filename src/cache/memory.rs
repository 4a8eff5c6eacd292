//! In-process fragment cache keyed by component cache key.
//!
//! The renderer writes a component's markup here after a cache-capturing
//! render and reads it back on the next request with the same key.

use std::sync::Arc;

use dashmap::DashMap;

use super::{CacheStore, RenderCache};

/// Thread-safe markup cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a fragment. Returns the old value if any.
    pub fn insert(&self, key: &str, html: String) -> Option<String> {
        self.inner.insert(key.to_string(), html)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    /// Drop every fragment whose key starts with `name::`.
    /// Used when a component's template changes.
    pub fn invalidate_component(&self, name: &str) {
        let prefix = format!("{name}::");
        self.inner.retain(|key, _| !key.starts_with(&prefix));
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Sorted keys, for inspection and deterministic test output.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn to_render_cache(&self) -> RenderCache {
        RenderCache::from_store(Arc::new(self.clone()))
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        MemoryCache::get(self, key)
    }

    fn set(&self, key: &str, value: String) {
        self.insert(key, value);
    }

    fn supports_has(&self) -> bool {
        true
    }

    fn has(&self, key: &str) -> bool {
        self.contains(key)
    }
}
