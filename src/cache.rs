//! # Packet Cache
//!
//! Pre-rendered row packets, keyed by product code and condition, so a
//! repeat print is instant. At most one product code is resident at a
//! time: storing packets for a different code evicts everything first.
//!
//! The cache is an in-memory structure with no persistence. Handles are
//! cheap clones of one shared state, so a background precache task and
//! the print driver operate on the same entries; when they race on a key
//! the last writer wins.

use std::sync::{Arc, Mutex};

use crate::condition::Condition;
use crate::render::label::ImagePacketSet;

#[derive(Default)]
struct CacheState {
    /// The single resident product code, if any.
    product_code: Option<String>,
    /// One slot per condition, indexed by `Condition::index`.
    packets: [Option<ImagePacketSet>; 3],
}

/// Shared per-product packet cache.
#[derive(Clone, Default)]
pub struct PacketCache {
    inner: Arc<Mutex<CacheState>>,
}

impl PacketCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the packet set for `(product_code, condition)`.
    pub fn get(&self, product_code: &str, condition: Condition) -> Option<ImagePacketSet> {
        let state = self.inner.lock().expect("cache lock poisoned");
        if state.product_code.as_deref() == Some(product_code) {
            state.packets[condition.index()].clone()
        } else {
            None
        }
    }

    /// Store a packet set. If the resident product code differs, all
    /// entries are cleared first and `product_code` becomes resident.
    pub fn put(&self, product_code: &str, condition: Condition, packets: ImagePacketSet) {
        let mut state = self.inner.lock().expect("cache lock poisoned");
        if state.product_code.as_deref() != Some(product_code) {
            state.packets = Default::default();
            state.product_code = Some(product_code.to_string());
        }
        state.packets[condition.index()] = Some(packets);
    }

    /// Drop every entry and the resident product code.
    pub fn clear(&self) {
        let mut state = self.inner.lock().expect("cache lock poisoned");
        *state = CacheState::default();
    }

    /// The currently resident product code, if any.
    pub fn resident_code(&self) -> Option<String> {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .product_code
            .clone()
    }

    /// True when `product_code` is resident and its `New` entry exists:
    /// the cheap "already precached" test used to skip redundant work.
    pub fn is_primed(&self, product_code: &str) -> bool {
        let state = self.inner.lock().expect("cache lock poisoned");
        state.product_code.as_deref() == Some(product_code)
            && state.packets[Condition::New.index()].is_some()
    }

    /// Number of populated condition slots for the resident code.
    pub fn len(&self) -> usize {
        let state = self.inner.lock().expect("cache lock poisoned");
        state.packets.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packets(tag: u8) -> ImagePacketSet {
        Arc::new(vec![vec![tag; 4]])
    }

    #[test]
    fn test_empty_cache_misses() {
        let cache = PacketCache::new();
        assert!(cache.get("B001XYZ", Condition::New).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.resident_code(), None);
    }

    #[test]
    fn test_put_then_get() {
        let cache = PacketCache::new();
        cache.put("B001XYZ", Condition::New, packets(1));

        let hit = cache.get("B001XYZ", Condition::New).unwrap();
        assert_eq!(*hit, vec![vec![1; 4]]);
        assert!(cache.get("B001XYZ", Condition::Good).is_none());
        assert_eq!(cache.resident_code().as_deref(), Some("B001XYZ"));
    }

    #[test]
    fn test_product_code_change_evicts_everything() {
        let cache = PacketCache::new();
        cache.put("A", Condition::New, packets(1));
        cache.put("A", Condition::Good, packets(2));

        cache.put("B", Condition::New, packets(3));

        assert!(cache.get("A", Condition::New).is_none());
        assert!(cache.get("A", Condition::Good).is_none());
        assert_eq!(*cache.get("B", Condition::New).unwrap(), vec![vec![3; 4]]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_last_writer_wins_per_key() {
        let cache = PacketCache::new();
        cache.put("A", Condition::New, packets(1));
        cache.put("A", Condition::New, packets(9));
        assert_eq!(*cache.get("A", Condition::New).unwrap(), vec![vec![9; 4]]);
    }

    #[test]
    fn test_clear() {
        let cache = PacketCache::new();
        cache.put("A", Condition::VeryGood, packets(1));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.resident_code(), None);
        assert!(cache.get("A", Condition::VeryGood).is_none());
    }

    #[test]
    fn test_is_primed_requires_new_entry() {
        let cache = PacketCache::new();
        assert!(!cache.is_primed("A"));

        cache.put("A", Condition::Good, packets(1));
        assert!(!cache.is_primed("A"), "Good alone does not prime the cache");

        cache.put("A", Condition::New, packets(2));
        assert!(cache.is_primed("A"));
        assert!(!cache.is_primed("B"));
    }

    #[test]
    fn test_clones_share_state() {
        let cache = PacketCache::new();
        let handle = cache.clone();
        handle.put("A", Condition::New, packets(1));
        assert!(cache.is_primed("A"));
    }
}
