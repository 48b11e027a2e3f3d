//! Bounded, time-expiring memory cache (C4): insertion-order eviction,
//! hit/miss counters, and a per-MTO frequency histogram for hot-key
//! reporting. Single `parking_lot::Mutex`; the hit path never allocates
//! beyond a short lookup (`spec.md` §4.4).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::assembler::AssembledStatus;

struct Entry {
    value: AssembledStatus,
    inserted_at: Instant,
    insertion_seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    insertion_order: Vec<String>,
    next_seq: u64,
    hits: u64,
    misses: u64,
    frequency: HashMap<String, u64>,
}

/// Snapshot returned by `stats()` (C10).
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub total_queries: u64,
    pub unique_mtos: usize,
}

/// The bounded memory tier.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_size: usize,
    ttl: Duration,
}

impl MemoryCache {
    #[must_use]
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_size: max_size.max(1),
            ttl,
        }
    }

    /// Returns a fresh entry for `mto`, or `None` on miss/expiry. An
    /// expired entry is removed on touch, per `spec.md` §4.4.
    pub fn get(&self, mto: &str) -> Option<AssembledStatus> {
        let mut inner = self.inner.lock();
        *inner.frequency.entry(mto.to_string()).or_insert(0) += 1;
        let expired = inner
            .entries
            .get(mto)
            .is_some_and(|e| e.inserted_at.elapsed() > self.ttl);
        if expired {
            inner.entries.remove(mto);
            inner.insertion_order.retain(|k| k != mto);
        }
        match inner.entries.get(mto) {
            Some(entry) => {
                inner.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Inserts or overwrites `mto`'s entry. On overflow past `max_size`,
    /// evicts the single oldest insertion.
    pub fn insert(&self, mto: String, value: AssembledStatus) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        if !inner.entries.contains_key(&mto) {
            inner.insertion_order.push(mto.clone());
        }
        inner.entries.insert(
            mto.clone(),
            Entry {
                value,
                inserted_at: Instant::now(),
                insertion_seq: seq,
            },
        );
        while inner.entries.len() > self.max_size {
            if let Some(oldest_key) = inner.insertion_order.first().cloned() {
                inner.insertion_order.remove(0);
                inner.entries.remove(&oldest_key);
            } else {
                break;
            }
        }
    }

    /// Removes one entry. Returns `true` if an entry was present.
    pub fn invalidate(&self, mto: &str) -> bool {
        let mut inner = self.inner.lock();
        inner.insertion_order.retain(|k| k != mto);
        inner.entries.remove(mto).is_some()
    }

    /// Drops every entry, returning the count dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let n = inner.entries.len();
        inner.entries.clear();
        inner.insertion_order.clear();
        n
    }

    /// Zeroes counters and the frequency histogram; entries are preserved.
    pub fn reset_stats(&self) {
        let mut inner = self.inner.lock();
        inner.hits = 0;
        inner.misses = 0;
        inner.frequency.clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let total = inner.hits + inner.misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            inner.hits as f64 / total as f64
        };
        CacheStats {
            size: inner.entries.len(),
            max_size: self.max_size,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate,
            total_queries: total,
            unique_mtos: inner.frequency.len(),
        }
    }

    /// The top-`n` MTOs by query frequency, most-queried first.
    #[must_use]
    pub fn hot_mtos(&self, n: usize) -> Vec<(String, u64)> {
        let inner = self.inner.lock();
        let mut entries: Vec<(String, u64)> = inner
            .frequency
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(n);
        entries
    }

    #[cfg(test)]
    fn insertion_seq_of(&self, mto: &str) -> Option<u64> {
        self.inner.lock().entries.get(mto).map(|e| e.insertion_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::AssembledStatus;
    use crate::types::DataSource;

    fn status() -> AssembledStatus {
        AssembledStatus {
            mto: "AK1".to_string(),
            children: Vec::new(),
            customer_name: None,
            delivery_date: None,
            data_source: DataSource::Live,
            cache_age_seconds: None,
        }
    }

    #[test]
    fn eviction_drops_oldest_insertion_on_overflow() {
        let cache = MemoryCache::new(2, Duration::from_secs(60));
        cache.insert("a".to_string(), status());
        cache.insert("b".to_string(), status());
        cache.insert("c".to_string(), status());
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn expired_entry_is_removed_on_touch() {
        let cache = MemoryCache::new(10, Duration::from_millis(1));
        cache.insert("a".to_string(), status());
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get("a").is_none());
        let stats = cache.stats();
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn hit_rate_is_zero_with_no_queries() {
        let cache = MemoryCache::new(10, Duration::from_secs(60));
        assert_eq!(cache.stats().hit_rate, 0.0);
    }

    #[test]
    fn clear_returns_dropped_count_and_empties_cache() {
        let cache = MemoryCache::new(10, Duration::from_secs(60));
        cache.insert("a".to_string(), status());
        cache.insert("b".to_string(), status());
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn hot_mtos_orders_by_frequency() {
        let cache = MemoryCache::new(10, Duration::from_secs(60));
        cache.insert("a".to_string(), status());
        cache.insert("b".to_string(), status());
        cache.get("a");
        cache.get("a");
        cache.get("b");
        let hot = cache.hot_mtos(2);
        assert_eq!(hot[0].0, "a");
    }

    #[test]
    fn insertion_sequence_is_monotonic() {
        let cache = MemoryCache::new(10, Duration::from_secs(60));
        cache.insert("a".to_string(), status());
        cache.insert("b".to_string(), status());
        assert!(cache.insertion_seq_of("a").unwrap() < cache.insertion_seq_of("b").unwrap());
    }
}
