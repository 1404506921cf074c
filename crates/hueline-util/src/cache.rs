//! Capacity-bounded recency cache with an eviction callback.
//!
//! [`BoundedCache`] keeps at most `capacity` entries. Every insert or explicit
//! touch stamps the entry with a value from a monotonically increasing clock;
//! when an insertion would overflow the capacity, the entries with the lowest
//! stamps are removed and passed to the eviction callback first. Because the
//! clock never repeats, two entries can never tie and older insertions are
//! always evicted before newer ones.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    hash::Hash,
};

use tracing::trace;

type EvictFn<K, V> = Box<dyn FnMut(&K, &V) + Send>;

struct Slot<V> {
    stamp: u64,
    value: V,
}

/// A bounded map that evicts its least recently touched entries.
///
/// Entries removed through [`remove`](Self::remove), [`retain`](Self::retain)
/// or [`drain`](Self::drain) are handed back to the caller and do not trigger
/// the eviction callback. Capacity-driven evictions and values replaced by
/// [`extend`](Self::extend) are reported instead, each exactly once.
pub struct BoundedCache<K, V> {
    entries: HashMap<K, Slot<V>>,
    order: BTreeMap<u64, K>,
    clock: u64,
    capacity: usize,
    on_evict: EvictFn<K, V>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a cache that silently drops evicted entries.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self::with_eviction(capacity, |_: &K, _: &V| {})
    }

    /// Create a cache that calls `on_evict` for every capacity-driven
    /// eviction, before the entry is dropped.
    ///
    /// A capacity of zero is treated as one.
    pub fn with_eviction<F>(capacity: usize, on_evict: F) -> Self
    where
        F: FnMut(&K, &V) + Send + 'static,
    {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            clock: 0,
            capacity: capacity.max(1),
            on_evict: Box::new(on_evict),
        }
    }

    /// Maximum number of entries held after any mutating call.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `key` is present. Does not touch the entry.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert `value` under `key`, making it the most recently touched entry.
    ///
    /// If the key was already present its value is replaced and the previous
    /// value returned; nothing is evicted in that case. Otherwise the least
    /// recently touched entries are evicted until the new entry fits.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let stamp = self.tick();
        if !self.entries.contains_key(&key) {
            self.evict_overflow(1);
        }
        self.put(key, value, stamp)
    }

    /// Insert every pair from `iter`, then run a single eviction pass sized to
    /// the total overflow.
    ///
    /// Pairs are stamped in iteration order, so if the batch alone exceeds the
    /// capacity its earliest pairs are evicted (and reported) as well. A pair
    /// whose key is already present replaces the old value, which is reported
    /// to the eviction callback since there is no caller to hand it back to.
    pub fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in iter {
            let stamp = self.tick();
            if let Some(previous) = self.put(key.clone(), value, stamp) {
                (self.on_evict)(&key, &previous);
            }
        }
        self.evict_overflow(0);
    }

    /// Mark `key` as most recently used. Returns `false` if it is absent.
    pub fn touch(&mut self, key: &K) -> bool {
        let stamp = self.tick();
        match self.entries.get_mut(key) {
            Some(slot) => {
                self.order.remove(&slot.stamp);
                slot.stamp = stamp;
                self.order.insert(stamp, key.clone());
                true
            }
            None => false,
        }
    }

    /// Look up `key` and touch it.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if !self.touch(key) {
            return None;
        }
        self.entries.get(key).map(|slot| &slot.value)
    }

    /// Look up `key` mutably and touch it.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if !self.touch(key) {
            return None;
        }
        self.entries.get_mut(key).map(|slot| &mut slot.value)
    }

    /// Look up `key` without changing its recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    /// Remove `key` and return its value without invoking the callback.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.stamp);
        Some(slot.value)
    }

    /// Keep only the entries for which `keep` returns `true`.
    ///
    /// Dropped entries are not reported to the eviction callback.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let order = &mut self.order;
        self.entries.retain(|key, slot| {
            let kept = keep(key, &mut slot.value);
            if !kept {
                order.remove(&slot.stamp);
            }
            kept
        });
    }

    /// Remove every entry, returning them least recently touched first.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        let order = std::mem::take(&mut self.order);
        let mut drained = Vec::with_capacity(order.len());
        for key in order.into_values() {
            if let Some(slot) = self.entries.remove(&key) {
                drained.push((key, slot.value));
            }
        }
        drained
    }

    /// Iterate over the entries, least recently touched first.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.order.values().filter_map(|key| {
            self.entries
                .get_key_value(key)
                .map(|(key, slot)| (key, &slot.value))
        })
    }

    /// Keys of all entries, least recently touched first.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn put(&mut self, key: K, value: V, stamp: u64) -> Option<V> {
        self.order.insert(stamp, key.clone());
        let previous = self.entries.insert(key, Slot { stamp, value })?;
        self.order.remove(&previous.stamp);
        Some(previous.value)
    }

    /// Evict the oldest entries until `incoming` more would fit.
    fn evict_overflow(&mut self, incoming: usize) {
        let target = self.capacity.saturating_sub(incoming);
        let mut evicted = 0usize;
        while self.entries.len() > target {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            if let Some(slot) = self.entries.remove(&key) {
                (self.on_evict)(&key, &slot.value);
                evicted += 1;
            }
        }
        if evicted > 0 {
            trace!(evicted, capacity = self.capacity, "evicted cache entries");
        }
    }
}

impl<K, V> fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
