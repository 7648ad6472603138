//! Query embedding cache
//!
//! Repeated questions are common in policy Q&A sessions, so query vectors are
//! kept in a bounded LRU map keyed by `sha256(text | model)`. A different
//! embedding model never reuses another model's vectors.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: usize,
    pub capacity: usize,
}

/// Bounded LRU map from cache key to embedding. A capacity of zero disables
/// caching entirely.
pub struct EmbeddingCache {
    entries: Option<Mutex<LruCache<String, Vec<f32>>>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn compute_key(text: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(b"|");
        hasher.update(model.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let entries = self.entries.as_ref()?;
        match entries.lock().get(key) {
            Some(vector) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(vector.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: String, vector: Vec<f32>) {
        if let Some(entries) = &self.entries {
            entries.lock().put(key, vector);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.as_ref().map_or(0, |e| e.lock().len()),
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_depends_on_model() {
        let a = EmbeddingCache::compute_key("coral reefs", "bge-small");
        let b = EmbeddingCache::compute_key("coral reefs", "text-embedding-3-small");
        assert_ne!(a, b);
        assert_eq!(a, EmbeddingCache::compute_key("coral reefs", "bge-small"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = EmbeddingCache::new(2);
        cache.put("a".into(), vec![1.0]);
        cache.put("b".into(), vec![2.0]);
        assert!(cache.get("a").is_some());
        cache.put("c".into(), vec![3.0]);

        // "b" was least recently used
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a"), Some(vec![1.0]));
        assert_eq!(cache.get("c"), Some(vec![3.0]));

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let cache = EmbeddingCache::new(0);
        cache.put("a".into(), vec![1.0]);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.stats().entry_count, 0);
    }
}
