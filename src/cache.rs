//! Caches and pools shared across an extraction run.
//!
//! Three pieces live here:
//!
//! - [`LruCache`]: strict O(1) least-recently-used map built on a slab with
//!   an intrusive doubly-linked access list. The per-document object cache
//!   wraps one in a mutex.
//! - [`ShardedCache`]: 16-way sharded key space for fonts and CMaps shared
//!   across pages. Reads take an uncontended shard read lock and clone an
//!   `Arc`; writes evict per shard, so eviction is approximate globally.
//! - [`VecPool`]: free-list of reusable buffers. Oversized buffers are
//!   dropped instead of returned, bounding idle memory.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, RwLock};

const NIL: usize = usize::MAX;

struct Slot<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// Capacity-bounded LRU map with O(1) get/insert/evict.
///
/// Recency is tracked by an intrusive doubly-linked list threaded through
/// slab slots; the map holds slot indices. With no capacity set the cache
/// grows without bound until [`LruCache::set_capacity`] is called.
pub struct LruCache<K: Eq + Hash + Clone, V> {
    map: HashMap<K, usize>,
    slots: Vec<Slot<K, V>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    capacity: Option<usize>,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    /// Unbounded cache.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            capacity: None,
        }
    }

    /// Cache bounded to `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut cache = Self::new();
        cache.capacity = Some(capacity.max(1));
        cache
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no entries are cached.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Set (or tighten) the capacity, evicting LRU entries as needed.
    pub fn set_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        self.capacity = Some(capacity);
        while self.map.len() > capacity {
            self.evict_lru();
        }
    }

    /// Look up `key`, promoting it to most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.unlink(idx);
        self.push_front(idx);
        Some(&self.slots[idx].value)
    }

    /// True when `key` is cached; does not touch recency.
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Insert `key`, evicting the least recently used entry when full.
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(&idx) = self.map.get(&key) {
            self.slots[idx].value = value;
            self.unlink(idx);
            self.push_front(idx);
            return;
        }

        if let Some(cap) = self.capacity {
            while self.map.len() >= cap {
                self.evict_lru();
            }
        }

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Slot {
                    key: key.clone(),
                    value,
                    prev: NIL,
                    next: NIL,
                };
                idx
            }
            None => {
                self.slots.push(Slot {
                    key: key.clone(),
                    value,
                    prev: NIL,
                    next: NIL,
                });
                self.slots.len() - 1
            }
        };
        self.map.insert(key, idx);
        self.push_front(idx);
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V>
    where
        V: Default,
    {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        self.free.push(idx);
        Some(std::mem::take(&mut self.slots[idx].value))
    }

    /// Drop every entry, keeping allocated capacity.
    pub fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    fn evict_lru(&mut self) {
        if self.tail == NIL {
            return;
        }
        let idx = self.tail;
        self.unlink(idx);
        let key = self.slots[idx].key.clone();
        self.map.remove(&key);
        self.free.push(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        if prev != NIL {
            self.slots[prev].next = next;
        } else if self.head == idx {
            self.head = next;
        }
        if next != NIL {
            self.slots[next].prev = prev;
        } else if self.tail == idx {
            self.tail = prev;
        }
        self.slots[idx].prev = NIL;
        self.slots[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = NIL;
        self.slots[idx].next = self.head;
        if self.head != NIL {
            self.slots[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }
}

impl<K: Eq + Hash + Clone, V> Default for LruCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// FNV-1a over the key bytes; shard index is `hash & (SHARDS - 1)`.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

const SHARDS: usize = 16;

struct Shard<V> {
    map: RwLock<HashMap<String, Arc<V>>>,
    /// Insertion order for per-shard eviction.
    order: Mutex<VecDeque<String>>,
}

impl<V> Shard<V> {
    fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
        }
    }
}

/// 16-way sharded concurrent cache keyed by string.
///
/// Used for fonts and CMaps shared by reference across pages. The read
/// path takes one shard read lock and clones an `Arc` — no allocation.
/// Each shard evicts independently once it exceeds `capacity / 16`
/// entries, so bounding is approximate across the whole key space.
pub struct ShardedCache<V> {
    shards: Vec<Shard<V>>,
    per_shard_capacity: usize,
}

impl<V> ShardedCache<V> {
    /// Cache holding roughly `capacity` entries across all shards.
    pub fn new(capacity: usize) -> Self {
        Self {
            shards: (0..SHARDS).map(|_| Shard::new()).collect(),
            per_shard_capacity: (capacity / SHARDS).max(1),
        }
    }

    fn shard(&self, key: &str) -> &Shard<V> {
        let idx = (fnv1a(key.as_bytes()) as usize) & (SHARDS - 1);
        &self.shards[idx]
    }

    /// Look up `key` in its shard.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let shard = self.shard(key);
        let map = shard.map.read().ok()?;
        map.get(key).cloned()
    }

    /// Insert `key`, evicting the shard's oldest entry when full.
    pub fn insert(&self, key: String, value: Arc<V>) {
        let shard = self.shard(&key);
        let mut map = match shard.map.write() {
            Ok(g) => g,
            Err(_) => return,
        };
        let mut order = match shard.order.lock() {
            Ok(g) => g,
            Err(_) => return,
        };
        if map.insert(key.clone(), value).is_none() {
            order.push_back(key);
            while map.len() > self.per_shard_capacity {
                match order.pop_front() {
                    Some(oldest) => {
                        map.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
    }

    /// Fetch `key`, computing and caching it on a miss.
    ///
    /// Concurrent misses may both compute; the first published value wins
    /// and is what both callers observe afterwards.
    pub fn get_or_insert_with(&self, key: &str, build: impl FnOnce() -> Arc<V>) -> Arc<V> {
        if let Some(hit) = self.get(key) {
            return hit;
        }
        let value = build();
        // Re-check under the write path so a racing insert is not clobbered.
        if let Some(hit) = self.get(key) {
            return hit;
        }
        self.insert(key.to_string(), Arc::clone(&value));
        value
    }

    /// Total live entries across shards.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.map.read().map(|m| m.len()).unwrap_or(0))
            .sum()
    }

    /// True when every shard is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything, releasing the shared values.
    pub fn clear(&self) {
        for shard in &self.shards {
            if let Ok(mut map) = shard.map.write() {
                map.clear();
            }
            if let Ok(mut order) = shard.order.lock() {
                order.clear();
            }
        }
    }
}

/// Buffers above this capacity are dropped rather than pooled.
pub const POOL_MAX_IDLE_CAPACITY: usize = 4096;

/// Free-list of reusable `Vec<T>` buffers.
///
/// `take` hands out a cleared buffer; `give` returns one unless it grew
/// past [`POOL_MAX_IDLE_CAPACITY`] elements, in which case it is dropped
/// so a single pathological page cannot pin memory for the whole batch.
pub struct VecPool<T> {
    free: Mutex<Vec<Vec<T>>>,
    max_idle: usize,
}

impl<T> VecPool<T> {
    /// Pool retaining at most `max_idle` buffers.
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Take a cleared buffer from the pool, or allocate a fresh one.
    pub fn take(&self) -> Vec<T> {
        match self.free.lock() {
            Ok(mut free) => free.pop().unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Return a buffer to the pool.
    pub fn give(&self, mut buf: Vec<T>) {
        buf.clear();
        if buf.capacity() == 0 || buf.capacity() > POOL_MAX_IDLE_CAPACITY {
            return;
        }
        if let Ok(mut free) = self.free.lock() {
            if free.len() < self.max_idle {
                free.push(buf);
            }
        }
    }

    /// Number of idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.free.lock().map(|f| f.len()).unwrap_or(0)
    }
}

impl<T> Default for VecPool<T> {
    fn default() -> Self {
        Self::new(32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_insert_get() {
        let mut cache = LruCache::new();
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let mut cache = LruCache::with_capacity(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        // Touch "a" so "b" becomes LRU.
        assert_eq!(cache.get(&"a"), Some(&1));
        cache.insert("c", 3);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"c"), Some(&3));
    }

    #[test]
    fn test_lru_never_exceeds_capacity() {
        let mut cache = LruCache::with_capacity(8);
        for i in 0..100 {
            cache.insert(i, i * 10);
            assert!(cache.len() <= 8);
        }
        // After 100 distinct inserts the first key is long gone.
        assert_eq!(cache.get(&0), None);
        assert_eq!(cache.get(&99), Some(&990));
    }

    #[test]
    fn test_lru_update_existing_key() {
        let mut cache = LruCache::with_capacity(2);
        cache.insert("a", 1);
        cache.insert("a", 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a"), Some(&2));
    }

    #[test]
    fn test_lru_remove_and_reuse_slot() {
        let mut cache = LruCache::with_capacity(4);
        cache.insert("a", 1);
        assert_eq!(cache.remove(&"a"), Some(1));
        assert_eq!(cache.len(), 0);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"b"), Some(&2));
    }

    #[test]
    fn test_lru_tighten_capacity_evicts() {
        let mut cache = LruCache::new();
        for i in 0..10 {
            cache.insert(i, i);
        }
        cache.set_capacity(3);
        assert_eq!(cache.len(), 3);
        // Most recent survivors.
        assert!(cache.contains(&9));
        assert!(cache.contains(&8));
        assert!(cache.contains(&7));
    }

    #[test]
    fn test_lru_clear() {
        let mut cache = LruCache::with_capacity(4);
        cache.insert(1, 1);
        cache.clear();
        assert!(cache.is_empty());
        cache.insert(2, 2);
        assert_eq!(cache.get(&2), Some(&2));
    }

    #[test]
    fn test_sharded_cache_basics() {
        let cache: ShardedCache<String> = ShardedCache::new(64);
        cache.insert("F1".to_string(), Arc::new("font".to_string()));
        assert_eq!(cache.get("F1").as_deref(), Some(&"font".to_string()));
        assert!(cache.get("F2").is_none());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sharded_cache_get_or_insert() {
        let cache: ShardedCache<u32> = ShardedCache::new(64);
        let v1 = cache.get_or_insert_with("k", || Arc::new(7));
        let v2 = cache.get_or_insert_with("k", || Arc::new(99));
        assert_eq!(*v1, 7);
        assert_eq!(*v2, 7);
    }

    #[test]
    fn test_sharded_cache_concurrent_access() {
        use std::thread;
        let cache: Arc<ShardedCache<usize>> = Arc::new(ShardedCache::new(256));
        let mut handles = Vec::new();
        for t in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("key-{}", (t * 100 + i) % 50);
                    cache.get_or_insert_with(&key, || Arc::new(i));
                    let _ = cache.get(&key);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(cache.len() <= 256);
    }

    #[test]
    fn test_pool_reuse() {
        let pool: VecPool<u8> = VecPool::new(4);
        let mut buf = pool.take();
        buf.extend_from_slice(b"hello");
        pool.give(buf);
        assert_eq!(pool.idle(), 1);
        let buf = pool.take();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 5);
    }

    #[test]
    fn test_pool_drops_oversized() {
        let pool: VecPool<u8> = VecPool::new(4);
        let buf = Vec::with_capacity(POOL_MAX_IDLE_CAPACITY + 1);
        pool.give(buf);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_fnv_shard_distribution() {
        // Keys should land on more than one shard.
        let mut seen = std::collections::HashSet::new();
        for i in 0..64 {
            let key = format!("font-{}", i);
            seen.insert((fnv1a(key.as_bytes()) as usize) & (SHARDS - 1));
        }
        assert!(seen.len() > 4);
    }
}
