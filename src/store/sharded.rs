//! # Sharded Store
//!
//! Concurrent key/value map split into a fixed number of independently locked
//! shards. A key always maps to the same shard (`hash(key) % shard_count`), so
//! operations on keys in different shards never contend, while operations on
//! the same key serialize through that shard's lock.
//!
//! `get` hands back a clone of the value. A `get` followed by a `put` is two
//! critical sections, so a concurrent writer can slip in between them. Callers
//! that need read-modify-write use [`ShardedStore::update_if_present`],
//! [`ShardedStore::compute_if_present`] or [`ShardedStore::put_if_absent`],
//! which hold the shard lock for the whole operation.
//!
//! ```rust
//! use iot_hub::store::ShardedStore;
//!
//! let store: ShardedStore<String, u32> = ShardedStore::new();
//! store.put("sensor-1".to_string(), 1);
//!
//! assert!(store.update_if_present(&"sensor-1".to_string(), |v| *v += 1));
//! assert_eq!(store.get(&"sensor-1".to_string()), Some(2));
//! assert!(!store.update_if_present(&"missing".to_string(), |v| *v += 1));
//! ```

use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use std::collections::hash_map::{Entry, RandomState};
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

use crate::constants::DEFAULT_SHARD_COUNT;

type Shard<K, V> = CachePadded<Mutex<HashMap<K, V>>>;

/// Thread-safe map partitioned into independently locked shards
pub struct ShardedStore<K, V, S = RandomState> {
    shards: Box<[Shard<K, V>]>,
    hasher: S,
}

impl<K, V> ShardedStore<K, V, RandomState>
where
    K: Eq + Hash,
{
    /// Create a store with the default shard count
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARD_COUNT)
    }

    /// Create a store with `shard_count` shards (clamped to at least one)
    pub fn with_shards(shard_count: usize) -> Self {
        Self::with_shards_and_hasher(shard_count, RandomState::new())
    }
}

impl<K, V> Default for ShardedStore<K, V, RandomState>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> ShardedStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Create a store with an explicit hasher, e.g. a deterministic one for tests
    pub fn with_shards_and_hasher(shard_count: usize, hasher: S) -> Self {
        let shard_count = shard_count.max(1);
        let shards = (0..shard_count)
            .map(|_| CachePadded::new(Mutex::new(HashMap::new())))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self { shards, hasher }
    }

    /// Number of shards fixed at construction
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard that owns `key`
    pub fn shard_index(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) % self.shards.len() as u64) as usize
    }

    fn shard(&self, key: &K) -> &Mutex<HashMap<K, V>> {
        &self.shards[self.shard_index(key)]
    }

    /// Insert or replace the value stored under `key`
    pub fn put(&self, key: K, value: V) {
        self.shard(&key).lock().insert(key, value);
    }

    /// Insert `value` only when `key` is absent. Returns true if it was inserted.
    pub fn put_if_absent(&self, key: K, value: V) -> bool {
        let mut shard = self.shard(&key).lock();
        match shard.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Clone of the value currently stored under `key`
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.shard(key).lock().get(key).cloned()
    }

    /// Remove `key`, returning true if a value was removed
    pub fn remove(&self, key: &K) -> bool {
        self.shard(key).lock().remove(key).is_some()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.shard(key).lock().contains_key(key)
    }

    /// Apply `mutator` to the value under `key` inside a single critical section.
    ///
    /// Returns false (and never calls `mutator`) when the key is absent.
    pub fn update_if_present<F>(&self, key: &K, mutator: F) -> bool
    where
        F: FnOnce(&mut V),
    {
        self.compute_if_present(key, mutator).is_some()
    }

    /// Like [`update_if_present`](Self::update_if_present) but returns whatever
    /// the closure computed, or `None` when the key is absent.
    pub fn compute_if_present<F, R>(&self, key: &K, f: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R,
    {
        let mut shard = self.shard(key).lock();
        shard.get_mut(key).map(f)
    }

    /// Visit every entry mutably, one shard lock at a time.
    ///
    /// Not atomic across shards: entries in shards already visited may change
    /// again before the pass finishes.
    pub fn update_all<F>(&self, mut f: F)
    where
        F: FnMut(&K, &mut V),
    {
        for shard in self.shards.iter() {
            let mut guard = shard.lock();
            for (key, value) in guard.iter_mut() {
                f(key, value);
            }
        }
    }

    /// Remove every entry, shard by shard
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.lock().clear();
        }
    }

    /// Total number of entries (a sum of per-shard snapshots)
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.lock().is_empty())
    }

    /// Snapshot of all keys
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        let mut keys = Vec::new();
        for shard in self.shards.iter() {
            keys.extend(shard.lock().keys().cloned());
        }
        keys
    }
}

impl<K, V, S> std::fmt::Debug for ShardedStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedStore")
            .field("shard_count", &self.shard_count())
            .field("len", &self.len())
            .finish()
    }
}
