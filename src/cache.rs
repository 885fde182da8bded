use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

struct Entry<V> {
    value: V,
    size_bytes: usize,
    inserted_at: Instant,
    last_access_ms: AtomicI64,
}

/// A bounded LRU cache with a per-entry TTL and an approximate byte budget,
/// shared by the embedding cache and the search cache.
/// Both keep the same eviction shape; only the key/value types differ.
///
/// Eviction is approximate by design: instead of an ordered structure, each
/// entry tracks its own last-access timestamp and `put` scans for the
/// least-recently-used entry once the byte budget is exceeded. This keeps
/// hot-path reads lock-free (a `DashMap` read) at the cost of an O(n) scan
/// only on the (rarer) path where the budget is actually exceeded.
pub struct BoundedCache<V> {
    entries: DashMap<String, Entry<V>>,
    used_bytes: AtomicUsize,
    budget_bytes: usize,
    ttl: Duration,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(budget_mb: usize, ttl_secs: u64) -> Self {
        Self {
            entries: DashMap::new(),
            used_bytes: AtomicUsize::new(0),
            budget_bytes: budget_mb * 1024 * 1024,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.inserted_at.elapsed() > self.ttl {
                    true
                } else {
                    entry.last_access_ms.store(now_ms(), Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
            }
            None => return None,
        };
        if expired {
            self.remove(key);
        }
        None
    }

    pub fn put(&self, key: String, value: V, size_bytes: usize) {
        if let Some((_, old)) = self.entries.remove(&key) {
            self.used_bytes.fetch_sub(old.size_bytes, Ordering::Relaxed);
        }
        self.entries.insert(
            key,
            Entry {
                value,
                size_bytes,
                inserted_at: Instant::now(),
                last_access_ms: AtomicI64::new(now_ms()),
            },
        );
        self.used_bytes.fetch_add(size_bytes, Ordering::Relaxed);
        self.evict_over_budget();
    }

    pub fn remove(&self, key: &str) {
        if let Some((_, entry)) = self.entries.remove(key) {
            self.used_bytes.fetch_sub(entry.size_bytes, Ordering::Relaxed);
        }
    }

    /// Drop every entry. Used on search-cache invalidation (any successful
    /// index/reindex/remove of a file invalidates the whole search cache).
    pub fn clear(&self) {
        self.entries.clear();
        self.used_bytes.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn evict_over_budget(&self) {
        while self.used_bytes.load(Ordering::Relaxed) > self.budget_bytes {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.last_access_ms.load(Ordering::Relaxed))
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => self.remove(&key),
                None => break,
            }
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn hits_and_misses() {
        let cache: BoundedCache<Vec<f32>> = BoundedCache::new(1, 3600);
        assert!(cache.get("k1").is_none());
        cache.put("k1".to_string(), vec![1.0, 2.0], 8);
        assert_eq!(cache.get("k1"), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn ttl_expiry_removes_lazily() {
        let cache: BoundedCache<i32> = BoundedCache::new(1, 0);
        cache.put("k1".to_string(), 42, 4);
        sleep(Duration::from_millis(5));
        assert!(cache.get("k1").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn evicts_least_recently_used_over_budget() {
        let cache: BoundedCache<Vec<u8>> = BoundedCache::new(1, 3600); // 1 MiB budget
        let chunk = vec![0u8; 700 * 1024];
        cache.put("a".to_string(), chunk.clone(), chunk.len());
        cache.put("b".to_string(), chunk.clone(), chunk.len());
        // a+b exceeds the 1 MiB budget; a is older and less recently
        // touched, so it is the one evicted.
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn clear_drops_everything() {
        let cache: BoundedCache<i32> = BoundedCache::new(1, 3600);
        cache.put("k1".to_string(), 1, 4);
        cache.put("k2".to_string(), 2, 4);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
