//! Size-bounded map that evicts its oldest quarter

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Insertion-ordered map capped at `max_entries`.
///
/// When an insert pushes the size past the cap, the oldest 25% of entries
/// (at least one) are dropped in one sweep.
#[derive(Debug, Clone)]
pub struct BoundedCache<K, V> {
    max_entries: usize,
    entries: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> BoundedCache<K, V> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite. Overwrites keep the original position.
    pub fn insert(&mut self, key: K, value: V) {
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        }
        if self.entries.len() > self.max_entries {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        let count = (self.entries.len() / 4).max(1);
        for key in self.order.drain(..count.min(self.order.len())) {
            self.entries.remove(&key);
        }
        log::debug!("Evicted {count} oldest cache entries");
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
