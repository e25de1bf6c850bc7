//! Bounded LRU store of retired tiles.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::tile_id::OverscaledTileId;

/// Bounded mapping from tile id to a retired tile, evicting in LRU order.
///
/// The cache owns what it stores: [`pop`](TileCache::pop) transfers the
/// value back to the caller, and evicted values are returned so the caller
/// can run their teardown (cancelling in-flight work, releasing GPU data).
pub struct TileCache<T> {
    cache: LruCache<OverscaledTileId, T>,
}

/// Default number of retired tiles kept around.
pub const DEFAULT_CACHE_SIZE: usize = 20;

impl<T> Default for TileCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl<T> TileCache<T> {
    /// Creates a cache holding up to `capacity` tiles.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(non_zero(capacity)),
        }
    }

    /// Number of stored tiles.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Maximum number of stored tiles.
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    /// True if the key is present.
    pub fn has(&self, id: &OverscaledTileId) -> bool {
        self.cache.contains(id)
    }

    /// Stores a tile under a key that must not be present yet.
    ///
    /// Returns the least-recently-used entry if storing pushed the cache
    /// over capacity. Adding a duplicate key is a contract violation: the
    /// value is rejected and the original entry is kept.
    pub fn add(&mut self, id: OverscaledTileId, value: T) -> Option<(OverscaledTileId, T)> {
        if self.cache.contains(&id) {
            debug_assert!(false, "duplicate tile cache entry {id}");
            log::error!("Rejected duplicate tile cache entry {id}");
            return None;
        }

        self.cache.push(id, value)
    }

    /// Removes the tile and returns it, transferring ownership to the
    /// caller.
    pub fn pop(&mut self, id: &OverscaledTileId) -> Option<T> {
        self.cache.pop(id)
    }

    /// Peeks at the tile without touching the LRU order.
    pub fn get(&self, id: &OverscaledTileId) -> Option<&T> {
        self.cache.peek(id)
    }

    /// Changes the capacity, evicting LRU entries that no longer fit.
    /// Returns the evicted entries.
    pub fn set_size(&mut self, capacity: usize) -> Vec<(OverscaledTileId, T)> {
        let mut evicted = Vec::new();
        while self.cache.len() > capacity.max(1) {
            if let Some(entry) = self.cache.pop_lru() {
                evicted.push(entry);
            } else {
                break;
            }
        }

        self.cache.resize(non_zero(capacity));
        evicted
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile_id::CanonicalTileId;

    fn id(z: u8, x: u32, y: u32) -> OverscaledTileId {
        OverscaledTileId::from_canonical(CanonicalTileId::new(z, x, y))
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let mut cache = TileCache::new(3);
        for i in 0..10 {
            cache.add(id(10, i, 0), i);
            assert!(cache.len() <= 3);
        }
    }

    #[test]
    fn lru_entry_is_evicted_first() {
        let mut cache = TileCache::new(3);
        assert!(cache.add(id(10, 0, 0), "a").is_none());
        assert!(cache.add(id(10, 1, 0), "b").is_none());
        assert!(cache.add(id(10, 2, 0), "c").is_none());

        let evicted = cache.add(id(10, 3, 0), "d").expect("over capacity");
        assert_eq!(evicted, (id(10, 0, 0), "a"));

        assert!(!cache.has(&id(10, 0, 0)));
        for i in 1..4 {
            assert!(cache.has(&id(10, i, 0)));
        }
    }

    #[test]
    fn pop_transfers_ownership() {
        let mut cache = TileCache::new(3);
        cache.add(id(10, 0, 0), "a");

        assert_eq!(cache.pop(&id(10, 0, 0)), Some("a"));
        assert!(!cache.has(&id(10, 0, 0)));
        assert_eq!(cache.pop(&id(10, 0, 0)), None);
    }

    #[test]
    #[should_panic(expected = "duplicate tile cache entry")]
    fn duplicate_add_fails_invariant_check() {
        let mut cache = TileCache::new(3);
        cache.add(id(10, 0, 0), 1);
        cache.add(id(10, 0, 0), 2);
    }

    #[test]
    fn get_peeks_without_promoting() {
        let mut cache = TileCache::new(2);
        cache.add(id(10, 0, 0), "a");
        cache.add(id(10, 1, 0), "b");

        assert_eq!(cache.get(&id(10, 0, 0)), Some(&"a"));

        // The peeked entry is still the LRU one.
        let evicted = cache.add(id(10, 2, 0), "c").expect("over capacity");
        assert_eq!(evicted.0, id(10, 0, 0));
    }

    #[test]
    fn shrinking_evicts_oldest() {
        let mut cache = TileCache::new(4);
        for i in 0..4 {
            cache.add(id(10, i, 0), i);
        }

        let evicted = cache.set_size(2);
        assert_eq!(evicted.len(), 2);
        assert_eq!(evicted[0].0, id(10, 0, 0));
        assert_eq!(evicted[1].0, id(10, 1, 0));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.capacity(), 2);
    }

    #[test]
    fn clear_drops_everything() {
        let mut cache = TileCache::new(4);
        for i in 0..4 {
            cache.add(id(10, i, 0), i);
        }

        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.has(&id(10, 0, 0)));
    }
}
