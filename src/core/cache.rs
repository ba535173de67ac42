//! Bounded get-or-compute cache shared across sessions.
//!
//! Each key owns a slot holding a [`OnceCell`]. Concurrent misses on the same
//! key clone the same slot and only one of them runs the initializer; the
//! others block until the value is ready. The map lock is never held while
//! computing.
//!
//! When full, expired entries are dropped first and then the oldest entry is
//! evicted. Entries optionally expire after a fixed time to live.

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

struct Slot<V> {
    value: OnceCell<V>,
    inserted_at: Instant,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self {
            value: OnceCell::new(),
            inserted_at: Instant::now(),
        }
    }
}

/// Thread-safe, capacity-bounded cache with single computation per key
pub struct BoundedCache<K, V> {
    max_entries: usize,
    ttl: Option<Duration>,
    slots: RwLock<HashMap<K, Arc<Slot<V>>>>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache without expiry
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            ttl: None,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a cache whose entries expire after `ttl`
    pub fn with_ttl(max_entries: usize, ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::new(max_entries)
        }
    }

    fn is_expired(&self, slot: &Slot<V>, now: Instant) -> bool {
        self.ttl
            .map(|ttl| now.duration_since(slot.inserted_at) >= ttl)
            .unwrap_or(false)
    }

    /// Returns the cached value for `key` or computes it with `init`
    ///
    /// A failed computation leaves no entry behind, so the next caller
    /// retries.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot_for(&key);
        let result = slot.value.get_or_try_init(init).cloned();
        if result.is_err() {
            let mut slots = self.slots.write();
            if slots
                .get(&key)
                .map(|current| Arc::ptr_eq(current, &slot) && current.value.get().is_none())
                .unwrap_or(false)
            {
                slots.remove(&key);
            }
        }
        result
    }

    /// Returns the cached value for `key` or computes it with `init`
    pub fn get_or_insert_with<F>(&self, key: K, init: F) -> V
    where
        F: FnOnce() -> V,
    {
        let slot = self.slot_for(&key);
        slot.value.get_or_init(init).clone()
    }

    /// Returns a live cached value without computing
    pub fn get(&self, key: &K) -> Option<V> {
        let slots = self.slots.read();
        let slot = slots.get(key)?;
        if self.is_expired(slot, Instant::now()) {
            return None;
        }
        slot.value.get().cloned()
    }

    fn slot_for(&self, key: &K) -> Arc<Slot<V>> {
        let now = Instant::now();
        {
            let slots = self.slots.read();
            if let Some(slot) = slots.get(key) {
                if !self.is_expired(slot, now) {
                    return Arc::clone(slot);
                }
            }
        }

        let mut slots = self.slots.write();
        // Another thread may have inserted while we waited for the write lock
        if let Some(slot) = slots.get(key) {
            if !self.is_expired(slot, now) {
                return Arc::clone(slot);
            }
            slots.remove(key);
        }

        if slots.len() >= self.max_entries {
            self.evict(&mut slots, now);
        }

        let slot = Arc::new(Slot::new());
        slots.insert(key.clone(), Arc::clone(&slot));
        slot
    }

    fn evict(&self, slots: &mut HashMap<K, Arc<Slot<V>>>, now: Instant) {
        if self.ttl.is_some() {
            slots.retain(|_, slot| !self.is_expired(slot, now));
        }

        while slots.len() >= self.max_entries {
            let oldest = slots
                .iter()
                .min_by_key(|(_, slot)| slot.inserted_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    slots.remove(&key);
                    trace!(remaining = slots.len(), "Evicted oldest cache entry");
                }
                None => break,
            }
        }
    }

    /// Number of entries, including ones not yet computed
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry
    pub fn clear(&self) {
        self.slots.write().clear();
    }
}
