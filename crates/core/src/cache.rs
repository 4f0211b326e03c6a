//! Bounded result cache keyed by source identity
//!
//! The cache is an explicit object owned by the caller. All state sits behind
//! one mutex; eviction is least-recently-used by entry count.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Content-addressed cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Hash of the source identity (path, URL, content digest)
    pub source_hash: String,

    /// Hash of the serialized processing options
    pub options_hash: String,
}

impl CacheKey {
    pub fn new(source_identity: &[u8], options: &[u8]) -> Self {
        Self {
            source_hash: blake3::hash(source_identity).to_hex().to_string(),
            options_hash: blake3::hash(options).to_hex().to_string(),
        }
    }

    /// Key for a source whose options are serialized with serde_json
    pub fn for_options<T: Serialize>(
        source_identity: &[u8],
        options: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(source_identity, &serde_json::to_vec(options)?))
    }

    pub fn to_key_string(&self) -> String {
        format!("{}_{}", self.source_hash, self.options_hash)
    }

    pub fn from_key_string(s: &str) -> Option<Self> {
        let (source_hash, options_hash) = s.split_once('_')?;
        if source_hash.is_empty() || options_hash.is_empty() || options_hash.contains('_') {
            return None;
        }
        Some(Self {
            source_hash: source_hash.to_string(),
            options_hash: options_hash.to_string(),
        })
    }
}

/// Snapshot of cache occupancy and counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

#[derive(Debug)]
struct Slot<V> {
    value: V,
    last_used: u64,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<CacheKey, Slot<V>>,
    // Monotonic access counter standing in for a timestamp
    clock: u64,
    hits: u64,
    misses: u64,
}

impl<V> CacheState<V> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
            debug!("Cache evicted {}", key.to_key_string());
        }
    }
}

/// Thread-safe LRU cache of processing results.
///
/// Cloning is cheap and shares the underlying storage. A capacity of zero
/// disables storage while still counting misses.
#[derive(Debug)]
pub struct ResultCache<V> {
    state: Arc<Mutex<CacheState<V>>>,
    capacity: usize,
}

impl<V> Clone for ResultCache<V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            capacity: self.capacity,
        }
    }
}

impl<V: Clone> ResultCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::with_capacity(capacity),
                clock: 0,
                hits: 0,
                misses: 0,
            })),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // A panic while holding the lock cannot leave the map half-updated
    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a value, refreshing its recency on a hit
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let mut state = self.lock();
        let now = state.tick();
        match state.entries.get_mut(key) {
            Some(slot) => {
                slot.last_used = now;
                let value = slot.value.clone();
                state.hits += 1;
                Some(value)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Store a value, evicting the least recently used entry when full
    pub fn put(&self, key: CacheKey, value: V) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.lock();
        let now = state.tick();
        if !state.entries.contains_key(&key) {
            while state.entries.len() >= self.capacity {
                state.evict_lru();
            }
        }
        state.entries.insert(
            key,
            Slot {
                value,
                last_used: now,
            },
        );
    }

    /// Return the cached value or compute, store and return it.
    ///
    /// The lock is not held while `compute` runs, so two threads missing on
    /// the same key may both compute it; the later insert wins.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &CacheKey,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = compute()?;
        self.put(key.clone(), value.clone());
        Ok(value)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let lookups = state.hits + state.misses;
        CacheStats {
            entries: state.entries.len(),
            capacity: self.capacity,
            hits: state.hits,
            misses: state.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                state.hits as f64 / lookups as f64
            },
        }
    }

    /// Drop every entry and reset the counters
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.hits = 0;
        state.misses = 0;
    }
}
