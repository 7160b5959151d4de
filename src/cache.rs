//! Cache (component C9): a bounded, TTL-evicting process-local cache over
//! expensive read operations.
//!
//! Entry shape and stats fields follow the same `CacheEntry`/`CacheStats`
//! split used elsewhere for process-local caches; LRU eviction on `set`
//! and lazy expiry-on-access are this engine's own additions.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CacheEntry {
    value: CachedValue,
    created_at: Instant,
}

/// Anything the cache can hold. Kept as a small closed enum rather than
/// `Box<dyn Any>` since the read paths this engine wraps (symbol search,
/// embedding fetch, scored semantic hits) return one of these shapes.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedValue {
    Symbols(Vec<crate::types::Symbol>),
    Embeddings(Vec<crate::types::Embedding>),
    ScoredSymbols(Vec<(f32, crate::types::Symbol)>),
}

/// Hit/miss/eviction counters exposed via `metrics()`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub hit_rate: f64,
}

struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// Least-recently-used order, oldest first. Touched on every read and
    /// write so eviction can pop the front.
    lru: Vec<String>,
    ttl: Duration,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// TTL + bounded-LRU cache over `string -> CachedValue`.
pub struct Cache {
    inner: Mutex<Inner>,
}

impl Cache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                lru: Vec::new(),
                ttl,
                capacity,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// `op:query:limit`-style cache key.
    pub fn key(op: &str, query: &str, limit: usize) -> String {
        format!("{op}:{query}:{limit}")
    }

    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get(key) {
            Some(entry) => entry.created_at.elapsed() > inner.ttl,
            None => {
                inner.misses += 1;
                return None;
            }
        };
        if expired {
            inner.entries.remove(key);
            inner.lru.retain(|k| k != key);
            inner.misses += 1;
            return None;
        }
        inner.hits += 1;
        touch_lru(&mut inner.lru, key);
        inner.entries.get(key).map(|e| e.value.clone())
    }

    pub fn set(&self, key: String, value: CachedValue) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= inner.capacity {
            evict_lru(&mut inner);
        }
        inner.entries.insert(key.clone(), CacheEntry { value, created_at: now });
        touch_lru(&mut inner.lru, &key);
    }

    pub fn delete(&self, key: &str) {
        let mut inner = self.inner.lock();
        inner.entries.remove(key);
        inner.lru.retain(|k| k != key);
    }

    /// Invalidate everything. Called on any delta; coarse invalidation
    /// is intentional rather than tracking fine-grained dependencies.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.lru.clear();
    }

    /// Drop every entry whose TTL has elapsed, regardless of access. Meant
    /// to be driven by a periodic sweeper task.
    pub fn sweep_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let ttl = inner.ttl;
        let expired: Vec<String> =
            inner.entries.iter().filter(|(_, e)| e.created_at.elapsed() > ttl).map(|(k, _)| k.clone()).collect();
        for key in &expired {
            inner.entries.remove(key);
            inner.lru.retain(|k| k != key);
        }
        expired.len()
    }

    pub fn metrics(&self) -> CacheMetrics {
        let inner = self.inner.lock();
        let total = inner.hits + inner.misses;
        CacheMetrics {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            size: inner.entries.len(),
            hit_rate: if total == 0 { 0.0 } else { inner.hits as f64 / total as f64 },
        }
    }
}

fn touch_lru(lru: &mut Vec<String>, key: &str) {
    lru.retain(|k| k != key);
    lru.push(key.to_string());
}

fn evict_lru(inner: &mut Inner) {
    if !inner.lru.is_empty() {
        let oldest = inner.lru.remove(0);
        inner.entries.remove(&oldest);
        inner.evictions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols_value(n: u32) -> CachedValue {
        CachedValue::Symbols(vec![crate::types::Symbol {
            id: format!("p:s:{n}"),
            name: "s".to_string(),
            kind: crate::types::SymbolKind::Function,
            package: "p".to_string(),
            file: "a.rs".into(),
            line: n,
            column: 0,
            signature: String::new(),
            doc: None,
            public: true,
            imports: vec![],
            calls: vec![],
            callers: vec![],
            params: vec![],
            returns: vec![],
            fields: vec![],
            methods: vec![],
        }])
    }

    #[test]
    fn hit_rate_monotonicity_under_repeated_reads() {
        let cache = Cache::new(Duration::from_secs(60), 10);
        cache.set("k".to_string(), symbols_value(1));

        for _ in 0..5 {
            assert!(cache.get("k").is_some());
        }
        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 5);
        assert_eq!(metrics.misses, 0);
    }

    #[test]
    fn miss_then_set_then_hit() {
        let cache = Cache::new(Duration::from_secs(60), 10);
        assert!(cache.get("missing").is_none());
        cache.set("missing".to_string(), symbols_value(1));
        assert!(cache.get("missing").is_some());
        let metrics = cache.metrics();
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.hits, 1);
    }

    #[test]
    fn expired_entry_is_evicted_lazily_on_access() {
        let cache = Cache::new(Duration::from_millis(10), 10);
        cache.set("k".to_string(), symbols_value(1));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.metrics().size, 0);
    }

    #[test]
    fn lru_eviction_drops_oldest_when_at_capacity() {
        let cache = Cache::new(Duration::from_secs(60), 2);
        cache.set("a".to_string(), symbols_value(1));
        cache.set("b".to_string(), symbols_value(2));
        cache.set("c".to_string(), symbols_value(3));

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.metrics().evictions, 1);
    }

    #[test]
    fn clear_invalidates_everything() {
        let cache = Cache::new(Duration::from_secs(60), 10);
        cache.set("k".to_string(), symbols_value(1));
        cache.clear();
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn sweep_expired_removes_stale_entries_without_access() {
        let cache = Cache::new(Duration::from_millis(10), 10);
        cache.set("k".to_string(), symbols_value(1));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.metrics().size, 0);
    }
}
