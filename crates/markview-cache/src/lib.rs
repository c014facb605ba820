//! Bounded in-memory cache for Markview.
//!
//! One [`MemoryCache`] is shared across all render pipelines in the
//! process. Entries carry an optional TTL and the store evicts its
//! oldest entries once it grows past `max_records`. Both reads and
//! writes purge expired and over-capacity entries first, so a caller
//! never observes a stale value.
//!
//! The store is `Mutex`-guarded: each `value`/`set_value` call is a
//! single atomic read-check-write, which is what makes it safe to share
//! between pipelines even when a host permits concurrent renders.
//!
//! # Example
//!
//! ```
//! use markview_cache::MemoryCache;
//!
//! let cache = MemoryCache::new(20);
//! cache.set_value("key", b"hello".to_vec(), None);
//! assert_eq!(cache.value("key"), Some(b"hello".to_vec()));
//! ```

mod ext;
pub use ext::CacheExt;

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

struct Store {
    records: HashMap<String, Entry>,
    // Insertion order, oldest first. Keys evicted from `records` may
    // linger here until the next purge; purge skips them.
    order: VecDeque<String>,
}

/// Key/value store bounded by record count, with per-entry TTL.
///
/// An entry stored with `ttl: None` never expires by time but is still
/// subject to oldest-first eviction once the store holds more than
/// `max_records` entries.
pub struct MemoryCache {
    store: Mutex<Store>,
    max_records: usize,
}

impl MemoryCache {
    /// Create a cache holding at most `max_records` entries.
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self {
            store: Mutex::new(Store {
                records: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_records,
        }
    }

    /// Retrieve a value, or `None` if absent or expired.
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        let mut store = self.store.lock().expect("cache mutex poisoned");
        Self::purge(&mut store, self.max_records);
        store.records.get(key).map(|e| e.value.clone())
    }

    /// Retrieve a value, falling back to `default` on a miss.
    pub fn value_or(&self, key: &str, default: Vec<u8>) -> Vec<u8> {
        self.value(key).unwrap_or(default)
    }

    /// Store a value. `ttl: None` means no time-based expiry.
    ///
    /// Overwriting an existing key refreshes its position in the
    /// eviction order.
    pub fn set_value(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let mut store = self.store.lock().expect("cache mutex poisoned");
        Self::purge(&mut store, self.max_records);

        let expires_at = ttl.map(|d| Instant::now() + d);
        if store.records.contains_key(key) {
            store.order.retain(|k| k != key);
        }
        store.order.push_back(key.to_owned());
        store
            .records
            .insert(key.to_owned(), Entry { value, expires_at });
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut store = self.store.lock().expect("cache mutex poisoned");
        store.records.clear();
        store.order.clear();
    }

    /// Number of live (non-expired) entries.
    pub fn len(&self) -> usize {
        let mut store = self.store.lock().expect("cache mutex poisoned");
        Self::purge(&mut store, self.max_records);
        store.records.len()
    }

    /// Whether the cache holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries, then the oldest entries beyond `max_records`.
    fn purge(store: &mut Store, max_records: usize) {
        let now = Instant::now();
        store
            .records
            .retain(|_, e| e.expires_at.is_none_or(|t| t > now));

        while store.records.len() > max_records {
            let Some(oldest) = store.order.pop_front() else {
                break;
            };
            if store.records.remove(&oldest).is_some() {
                tracing::debug!(key = %oldest, "cache record evicted");
            }
        }
        // Drop order entries whose record is already gone.
        store.order.retain(|k| store.records.contains_key(k));
    }
}
