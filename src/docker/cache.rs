// ABOUTME: Typed in-memory cache with per-entry time-to-live.
// ABOUTME: Backs the container inspect cache; expired entries read as misses.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Errors from cache writes. Callers treat these as non-fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("cache full ({0} live entries)")]
    Full(usize),
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A `get`/`set` store where every entry carries its own TTL.
///
/// Keys and values are typed, so a lookup can never return a value of the
/// wrong shape. Expiry is checked on read; `purge_expired` reclaims memory
/// for entries nobody reads again.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    capacity: Option<usize>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    /// An unbounded cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: None,
        }
    }

    /// A cache that refuses new keys once `capacity` live entries are held.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_capacity(capacity.min(1024))),
            capacity: Some(capacity),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry.
    pub fn set(&self, key: K, value: V, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if let Some(capacity) = self.capacity
            && !entries.contains_key(&key)
            && entries.len() >= capacity
        {
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= capacity {
                return Err(CacheError::Full(entries.len()));
            }
        }

        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.lock().remove(key).map(|entry| entry.value)
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
