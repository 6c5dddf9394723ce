//! Bounded recently-seen cache for message dedup.

use std::collections::VecDeque;

use hopframe_proto::MsgUuid;

/// Insertion-ordered LRU set of recently seen message uuids.
///
/// Both queries and insertions promote the entry to the most-recent end;
/// when full, inserting evicts the least-recently-touched entry. Capacities
/// are small (32 by default), so a linear scan over a deque beats a hash
/// map here.
#[derive(Debug)]
pub struct RecentCache {
    entries: VecDeque<MsgUuid>,
    cap: usize,
}

impl RecentCache {
    /// Create a cache holding at most `cap` uuids.
    pub fn new(cap: usize) -> Self {
        Self { entries: VecDeque::with_capacity(cap), cap }
    }

    /// Whether `uuid` was seen recently. A hit promotes it to most-recent.
    pub fn exists(&mut self, uuid: MsgUuid) -> bool {
        match self.entries.iter().position(|&u| u == uuid) {
            Some(at) => {
                self.entries.remove(at);
                self.entries.push_back(uuid);
                true
            },
            None => false,
        }
    }

    /// Record `uuid`, promoting it if already present and evicting the
    /// oldest entry when over capacity.
    pub fn put(&mut self, uuid: MsgUuid) {
        if let Some(at) = self.entries.iter().position(|&u| u == uuid) {
            self.entries.remove(at);
        }
        self.entries.push_back(uuid);
        if self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    /// Number of cached uuids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_exists() {
        let mut cache = RecentCache::new(4);
        assert!(!cache.exists(1));
        cache.put(1);
        assert!(cache.exists(1));
    }

    #[test]
    fn forty_puts_into_thirty_two_evict_the_oldest_eight() {
        let mut cache = RecentCache::new(32);
        for uuid in 0..40 {
            cache.put(uuid);
        }
        assert_eq!(cache.len(), 32);
        for uuid in 0..8 {
            assert!(!cache.exists(uuid), "uuid {uuid} should have been evicted");
        }
        for uuid in 8..40 {
            assert!(cache.exists(uuid), "uuid {uuid} should survive");
        }
    }

    #[test]
    fn exists_promotes_against_eviction() {
        let mut cache = RecentCache::new(32);
        for uuid in 0..32 {
            cache.put(uuid);
        }
        // Touch the oldest entry, then fill with 31 fresh uuids.
        assert!(cache.exists(0));
        for uuid in 100..131 {
            cache.put(uuid);
        }
        assert!(cache.exists(0), "promoted entry should survive 31 inserts");
        assert!(!cache.exists(1), "unpromoted entry should be gone");
    }

    #[test]
    fn put_of_existing_entry_promotes() {
        let mut cache = RecentCache::new(2);
        cache.put(1);
        cache.put(2);
        cache.put(1); // promote, not duplicate
        assert_eq!(cache.len(), 2);
        cache.put(3); // evicts 2, the least-recently-touched
        assert!(cache.exists(1));
        assert!(!cache.exists(2));
        assert!(cache.exists(3));
    }
}
