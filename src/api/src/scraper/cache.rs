//! In-memory cache with TTL support.
//!
//! Lives for the lifetime of the process; a restart starts cold.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Cache entry with expiry
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Concurrent key/value cache with a fixed TTL and a size bound
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries for `ttl` each
    pub fn new(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
            clock,
        }
    }

    /// Get cached value if not expired
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();

        {
            let entry = self.entries.get(key)?;
            if now < entry.expires_at {
                return Some(entry.value.clone());
            }
        }

        // Remove expired entry, unless a fresh one was written meanwhile
        if self.entries.remove_if(key, |_, e| now >= e.expires_at).is_some() {
            debug!("Evicted stale cache entry {:?}", key);
        }
        None
    }

    /// Insert or overwrite, expiring `ttl` from now.
    ///
    /// Eviction runs after the insert, so the size returns to `capacity`
    /// once every concurrent `put` has finished.
    pub fn put(&self, key: K, value: V) {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let replaced = self
            .entries
            .insert(key.clone(), CacheEntry { value, expires_at });

        if replaced.is_none() && self.entries.len() > self.capacity {
            self.make_room(now, &key);
        }
    }

    /// Number of entries, expired ones included until they are touched
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn make_room(&self, now: DateTime<Utc>, keep: &K) {
        self.entries.retain(|_, e| now < e.expires_at);

        // Still full: drop the entries closest to expiry
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .filter(|e| e.key() != keep)
                .min_by_key(|e| e.value().expires_at)
                .map(|e| e.key().clone());

            let Some(key) = oldest else {
                break;
            };
            debug!("Cache full, evicting {:?}", key);
            self.entries.remove(&key);
        }
    }
}
