//! Result cache for the loading boundary
//!
//! Analysis functions never consult a cache themselves; callers that load the
//! same file selection repeatedly can inject a [`ResultCache`] into the
//! session instead.

use crate::config::CacheConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tracing::debug;

/// Hit / miss counters of a cache
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    /// Hit rate in percent (0 before the first lookup)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 * 100.0 / total as f64
        }
    }
}

/// Key/value cache with per-entry time-to-live
pub trait ResultCache<K, V>: Send {
    /// Look up `key`, returning a clone of the stored value if still fresh
    fn get(&mut self, key: &K) -> Option<V>;

    /// Store `value`; `None` uses the cache's default TTL
    fn put(&mut self, key: K, value: V, ttl: Option<Duration>);

    fn remove(&mut self, key: &K) -> Option<V>;

    fn clear(&mut self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> CacheStats;
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
    last_used: u64,
}

/// Least-recently-used cache with a fixed capacity
#[derive(Debug)]
pub struct LruCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    max_entries: usize,
    default_ttl: Duration,
    tick: u64,
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            default_ttl,
            tick: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn cleanup_expired(&mut self) -> usize {
        self.cleanup_expired_at(Instant::now())
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        let expired = match self.entries.get(key) {
            None => {
                self.stats.misses += 1;
                return None;
            }
            Some(entry) => now >= entry.expires_at,
        };
        if expired {
            self.entries.remove(key);
            self.stats.misses += 1;
            self.stats.expirations += 1;
            return None;
        }

        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        entry.last_used = tick;
        self.stats.hits += 1;
        Some(entry.value.clone())
    }

    fn put_at(&mut self, key: K, value: V, ttl: Option<Duration>, now: Instant) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.cleanup_expired_at(now);
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
                self.stats.evictions += 1;
                debug!("Cache evicted least recently used entry");
            }
        }

        let last_used = self.next_tick();
        let expires_at = now + ttl.unwrap_or(self.default_ttl);
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at,
                last_used,
            },
        );
    }

    fn cleanup_expired_at(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| now < e.expires_at);
        let removed = before - self.entries.len();
        self.stats.expirations += removed as u64;
        if removed > 0 {
            debug!("Cache dropped {} expired entries", removed);
        }
        removed
    }
}

impl<K, V> ResultCache<K, V> for LruCache<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send,
{
    fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn put(&mut self, key: K, value: V, ttl: Option<Duration>) {
        self.put_at(key, value, ttl, Instant::now())
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| e.value)
    }

    fn clear(&mut self) {
        let count = self.entries.len();
        self.entries.clear();
        self.stats = CacheStats::default();
        debug!("Cache cleared ({} entries)", count);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            max_entries: self.max_entries,
            ..self.stats.clone()
        }
    }
}
