//! Bounded LRU map for decoded audio.
//!
//! Purely access driven: `get` promotes, `set` evicts the least recently used
//! entry when full. There is no background sweep.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

pub const DEFAULT_CAPACITY: usize = 5;

#[derive(Debug, Clone)]
pub struct LruCache<K, V> {
    capacity: usize,
    map: HashMap<K, V>,
    // front = least recently used
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> Default for LruCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    /// `capacity` is raised to 1 if zero.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { capacity, map: HashMap::with_capacity(capacity), order: VecDeque::with_capacity(capacity) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Presence check; does not promote.
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Lookup and promote to most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.map.contains_key(key) {
            self.touch(key);
        }
        self.map.get(key)
    }

    /// Insert or replace. Returns the evicted key, if any.
    pub fn set(&mut self, key: K, value: V) -> Option<K> {
        if self.map.contains_key(&key) {
            self.touch(&key);
            self.map.insert(key, value);
            return None;
        }
        let mut evicted = None;
        if self.map.len() >= self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.map.remove(&old);
                evicted = Some(old);
            }
        }
        self.order.push_back(key.clone());
        self.map.insert(key, value);
        evicted
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let v = self.map.remove(key)?;
        self.order.retain(|k| k != key);
        Some(v)
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    /// Keys from least to most recently used.
    pub fn keys_lru(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_accessed() {
        let mut c = LruCache::new(2);
        c.set("A", 1);
        c.set("B", 2);
        assert_eq!(c.get(&"A"), Some(&1));
        assert_eq!(c.set("C", 3), Some("B"));
        assert!(c.contains(&"A") && c.contains(&"C"));
        assert!(!c.contains(&"B"));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn capacity_plus_one_evicts_exactly_one() {
        let mut c = LruCache::new(5);
        for i in 0..5 {
            c.set(i, i * 10);
        }
        c.get(&0);
        assert_eq!(c.set(99, 0), Some(1));
        assert_eq!(c.len(), 5);
        assert_eq!(c.keys_lru().copied().collect::<Vec<_>>(), vec![2, 3, 4, 0, 99]);
    }

    #[test]
    fn access_never_grows() {
        let mut c = LruCache::new(3);
        c.set("x", 1);
        for _ in 0..10 {
            c.get(&"x");
            c.set("x", 2);
        }
        assert_eq!(c.len(), 1);
        assert_eq!(c.get(&"x"), Some(&2));
        assert_eq!(c.get(&"missing"), None);
    }

    #[test]
    fn zero_capacity_is_raised() {
        let mut c = LruCache::new(0);
        assert_eq!(c.capacity(), 1);
        c.set(1, ());
        c.set(2, ());
        assert_eq!(c.len(), 1);
        assert!(c.contains(&2));
        c.clear();
        assert!(c.is_empty());
    }
}
