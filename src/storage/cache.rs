//! # Node Cache
//!
//! A bounded map from file offset to decoded node, so hot nodes near the
//! top of the tree are not re-read and re-parsed on every descent. Because
//! records are immutable once written, a cached node can never go stale
//! under append-only operation; the cache only has to be dropped when
//! offsets themselves are reassigned (after compaction rewrites the file,
//! or after a rollback truncates the tail that a failed mutation wrote).
//!
//! ## Eviction
//!
//! Capacity is [`CACHE_CAPACITY`] entries, enforced before each insertion.
//! Eviction is second-chance: a sweep hand clears the visited flag of
//! entries it passes and evicts the first entry found unvisited, so nodes
//! touched since the last sweep survive one extra round. Descents touch the
//! root and upper interior nodes constantly, which keeps them resident
//! while leaf pages from one-off scans cycle out quickly.
//!
//! The cache is private to one store instance and guarded by the store's
//! mutex; there is no negative caching and no cross-process sharing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::CACHE_CAPACITY;
use crate::tree::Node;

struct CacheEntry {
    offset: u32,
    node: Arc<Node>,
    visited: bool,
}

pub struct NodeCache {
    entries: Vec<CacheEntry>,
    index: HashMap<u32, usize>,
    hand: usize,
    capacity: usize,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::with_capacity(CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            hand: 0,
            capacity,
        }
    }

    pub fn get(&mut self, offset: u32) -> Option<Arc<Node>> {
        let idx = *self.index.get(&offset)?;
        self.entries[idx].visited = true;
        Some(Arc::clone(&self.entries[idx].node))
    }

    pub fn insert(&mut self, offset: u32, node: Arc<Node>) {
        if self.capacity == 0 {
            return;
        }
        if let Some(&idx) = self.index.get(&offset) {
            self.entries[idx].node = node;
            self.entries[idx].visited = true;
            return;
        }
        while self.entries.len() >= self.capacity {
            self.evict_one();
        }
        self.index.insert(offset, self.entries.len());
        self.entries.push(CacheEntry {
            offset,
            node,
            visited: false,
        });
    }

    fn evict_one(&mut self) {
        loop {
            if self.hand >= self.entries.len() {
                self.hand = 0;
            }
            if self.entries[self.hand].visited {
                self.entries[self.hand].visited = false;
                self.hand += 1;
                continue;
            }

            let evicted = self.entries.swap_remove(self.hand);
            self.index.remove(&evicted.offset);
            if self.hand < self.entries.len() {
                let moved = self.entries[self.hand].offset;
                self.index.insert(moved, self.hand);
            }
            return;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.hand = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for NodeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(byte: u8) -> Arc<Node> {
        Arc::new(Node::Leaf(vec![(vec![byte], vec![byte])]))
    }

    #[test]
    fn get_returns_inserted_nodes() {
        let mut cache = NodeCache::new();
        cache.insert(0, leaf(1));
        assert_eq!(cache.get(0).unwrap().first_key(), Some(&[1u8][..]));
        assert!(cache.get(7).is_none());
    }

    #[test]
    fn capacity_is_enforced_before_insertion() {
        let mut cache = NodeCache::new();
        for i in 0..(CACHE_CAPACITY as u32 + 10) {
            cache.insert(i, leaf(0));
        }
        assert_eq!(cache.len(), CACHE_CAPACITY);
    }

    #[test]
    fn visited_entries_survive_one_sweep() {
        let mut cache = NodeCache::with_capacity(3);
        cache.insert(1, leaf(1));
        cache.insert(2, leaf(2));
        cache.insert(3, leaf(3));
        // Touch offset 2 so the hand passes over it once.
        cache.get(2).unwrap();
        cache.insert(4, leaf(4));
        assert!(cache.get(2).is_some());
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn reinserting_an_offset_replaces_the_node() {
        let mut cache = NodeCache::new();
        cache.insert(5, leaf(1));
        cache.insert(5, leaf(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(5).unwrap().first_key(), Some(&[2u8][..]));
    }

    #[test]
    fn clear_empties_the_cache() {
        let mut cache = NodeCache::new();
        cache.insert(1, leaf(1));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(1).is_none());
    }
}
