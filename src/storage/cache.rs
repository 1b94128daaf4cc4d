//! Hot-Path Read Cache
//!
//! Fixed-capacity LRU with per-item TTL, shared by reads and local writes.
//! Expiry is checked lazily on lookup; a hit promotes the item to the MRU
//! end, while `update_value` refreshes an item in place without touching its
//! recency. Every operation holds the single mutex for its whole duration.
//!
//! Recency is tracked with a monotonic sequence counter plus a `BTreeMap`
//! index from sequence to key, so eviction of the LRU end is a range-min
//! lookup rather than a list walk.

use crate::cluster::types::Entry;

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

pub const DEFAULT_CAPACITY: usize = 500;
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheItem {
    value: String,
    created_at: Instant,
    recency: u64,
}

#[derive(Default)]
struct CacheState {
    items: HashMap<String, CacheItem>,
    by_recency: BTreeMap<u64, String>,
    next_seq: u64,
}

pub struct LruTtlCache {
    state: Mutex<CacheState>,
    capacity: usize,
    ttl: Duration,
}

impl LruTtlCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    /// Looks up a key. An expired item is evicted and reported as a miss;
    /// a live hit is promoted to the MRU end.
    pub fn find(&self, key: &str) -> Option<Entry> {
        let mut state = self.state.lock();

        let expired = state.items.get(key)?.created_at.elapsed() > self.ttl;
        if expired {
            if let Some(item) = state.items.remove(key) {
                state.by_recency.remove(&item.recency);
            }
            return None;
        }

        let seq = state.next_seq;
        state.next_seq += 1;

        let CacheState {
            items, by_recency, ..
        } = &mut *state;
        let item = items.get_mut(key)?;

        by_recency.remove(&item.recency);
        by_recency.insert(seq, key.to_string());
        item.recency = seq;

        Some(Entry {
            key: key.to_string(),
            value: item.value.clone(),
        })
    }

    /// Inserts an entry at the MRU end, evicting the LRU end when full.
    pub fn add(&self, entry: Entry) {
        let mut state = self.state.lock();

        if !state.items.contains_key(&entry.key) && state.items.len() >= self.capacity {
            let oldest = state.by_recency.keys().next().copied();
            if let Some(oldest) = oldest {
                if let Some(victim) = state.by_recency.remove(&oldest) {
                    state.items.remove(&victim);
                }
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;

        if let Some(previous) = state.items.insert(
            entry.key.clone(),
            CacheItem {
                value: entry.value,
                created_at: Instant::now(),
                recency: seq,
            },
        ) {
            state.by_recency.remove(&previous.recency);
        }

        state.by_recency.insert(seq, entry.key);
    }

    /// Refreshes an existing item's value and creation time in place.
    /// Recency is deliberately left untouched; only `find` promotes.
    pub fn update_value(&self, entry: &Entry) {
        let mut state = self.state.lock();

        if let Some(item) = state.items.get_mut(&entry.key) {
            item.value = entry.value.clone();
            item.created_at = Instant::now();
        }
    }

    pub fn delete(&self, key: &str) {
        let mut state = self.state.lock();

        if let Some(item) = state.items.remove(key) {
            state.by_recency.remove(&item.recency);
        }
    }

    pub fn purge(&self) {
        let mut state = self.state.lock();
        state.items.clear();
        state.by_recency.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
