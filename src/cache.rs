//! Bounded insertion-order cache.
//!
//! Backs the per-column aggregate cache in [`crate::store::ColumnStore`].
//! Entries are evicted oldest-first once the capacity is exceeded; lookups do
//! not promote entries. Replacing an existing key keeps its slot.

use std::collections::VecDeque;
use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Cache with a fixed capacity and oldest-first eviction.
#[derive(Debug, Clone)]
pub struct LruCache<K: Hash + Eq + Clone, V> {
    entries: FxHashMap<K, V>,
    order: VecDeque<K>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// A capacity of 0 disables caching entirely.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        if self.capacity == 0 {
            return None;
        }
        self.entries.get(key)
    }

    /// Insert or replace. Returns `false` only when caching is disabled.
    pub fn put(&mut self, key: K, value: V) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return true;
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
        self.enforce_cap();
        true
    }

    /// Drop every entry whose key fails `keep`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K) -> bool,
    {
        self.entries.retain(|k, _| keep(k));
        let entries = &self.entries;
        self.order.retain(|k| entries.contains_key(k));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn enforce_cap(&mut self) {
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_is_oldest_first() {
        let mut cache: LruCache<u32, &str> = LruCache::new(2);
        cache.put(1, "a");
        cache.put(2, "b");
        cache.put(3, "c");
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(&"b"));
        assert_eq!(cache.get(&3), Some(&"c"));
    }

    #[test]
    fn test_put_replaces_in_place() {
        let mut cache: LruCache<u32, &str> = LruCache::new(2);
        cache.put(1, "a");
        cache.put(2, "b");
        cache.put(1, "a2");
        assert_eq!(cache.get(&1), Some(&"a2"));
        cache.put(3, "c");
        // 1 is still the oldest slot
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(&"b"));
    }

    #[test]
    fn test_zero_capacity() {
        let mut cache: LruCache<u32, u32> = LruCache::new(0);
        assert!(!cache.put(1, 1));
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn test_retain_and_clear() {
        let mut cache: LruCache<(u32, u8), u32> = LruCache::new(2);
        cache.put((1, 0), 10);
        cache.put((1, 1), 11);
        cache.retain(|&(col, _)| col != 1);
        assert_eq!(cache.get(&(1, 0)), None);
        cache.put((2, 0), 20);
        cache.put((3, 0), 30);
        assert_eq!(cache.get(&(2, 0)), Some(&20));
        assert_eq!(cache.get(&(3, 0)), Some(&30));
        cache.clear();
        assert_eq!(cache.get(&(2, 0)), None);
    }
}
