//! Bounded chunk cache (§4.4, §5): "a bounded in-memory cache keyed by
//! `chunkCRange`... replacement policy: least-recently-completed, with a
//! pin on any chunk currently required by the reader head." Guarded by a
//! single mutex in the engine, mirroring the index reader's node cache and
//! the teacher's preference for one lock per shared table rather than
//! fine-grained locking.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::primitive::CPtr;

pub struct ChunkCache {
    capacity: usize,
    entries: HashMap<CPtr, Arc<Vec<u8>>>,
    /// Recency queue, oldest at the front. May contain stale keys after a
    /// `get` bumps an entry; `evict` skips entries no longer present.
    order: VecDeque<CPtr>,
    /// Reference counts for slots the reader head currently holds; pinned
    /// entries are never evicted regardless of recency.
    pins: HashMap<CPtr, usize>,
}

impl ChunkCache {
    pub fn new(capacity: usize) -> Self {
        ChunkCache {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            pins: HashMap::new(),
        }
    }

    pub fn get(&mut self, key: CPtr) -> Option<Arc<Vec<u8>>> {
        let hit = self.entries.get(&key).cloned();
        if hit.is_some() {
            self.order.push_back(key);
        }
        hit
    }

    pub fn insert(&mut self, key: CPtr, value: Arc<Vec<u8>>) {
        if !self.entries.contains_key(&key) {
            self.entries.insert(key, value);
            self.order.push_back(key);
            self.evict_excess();
        }
    }

    pub fn pin(&mut self, key: CPtr) {
        *self.pins.entry(key).or_insert(0) += 1;
    }

    pub fn unpin(&mut self, key: CPtr) {
        if let Some(count) = self.pins.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.pins.remove(&key);
            }
        }
        self.evict_excess();
    }

    fn evict_excess(&mut self) {
        while self.entries.len() > self.capacity {
            let Some(candidate) = self.order.pop_front() else {
                break;
            };
            if self.pins.contains_key(&candidate) {
                // still referenced by the reader head; requeue and try the
                // next-oldest instead.
                self.order.push_back(candidate);
                if self.order.len() <= self.entries.len() {
                    // every remaining entry is pinned; nothing left to evict.
                    break;
                }
                continue;
            }
            if !self.entries.contains_key(&candidate) {
                continue; // stale recency entry, already evicted
            }
            self.entries.remove(&candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_completed_beyond_capacity() {
        let mut cache = ChunkCache::new(2);
        cache.insert(1, Arc::new(vec![1]));
        cache.insert(2, Arc::new(vec![2]));
        cache.insert(3, Arc::new(vec![3]));
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn pinned_entries_survive_eviction_pressure() {
        let mut cache = ChunkCache::new(1);
        cache.insert(1, Arc::new(vec![1]));
        cache.pin(1);
        cache.insert(2, Arc::new(vec![2]));
        assert!(cache.get(1).is_some(), "pinned entry must not be evicted");
        cache.unpin(1);
        cache.insert(3, Arc::new(vec![3]));
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn repeated_insert_of_same_key_is_noop() {
        let mut cache = ChunkCache::new(4);
        cache.insert(1, Arc::new(vec![1]));
        cache.insert(1, Arc::new(vec![9]));
        assert_eq!(*cache.get(1).unwrap(), vec![1]);
    }
}
