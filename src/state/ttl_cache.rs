use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Cached value with the time it was fetched and how long it stays servable.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Valid while `now - fetched_at <= ttl`.
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) <= self.ttl
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TtlStats {
    pub entries: usize,
    pub stale_entries: usize,
}

/// Concurrent map whose reads treat expired entries as absent.
///
/// Expired entries stay in the map until overwritten or [`TtlCache::purge_expired`] runs, so
/// `stats()` can report how much of the cache is stale.
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let entry = self.entries.get(key)?;
        entry.is_fresh_at(now).then(|| entry.value.clone())
    }

    /// Unconditional overwrite; resets the fetch timestamp.
    pub fn put_at(&self, key: K, value: V, ttl: Duration, fetched_at: Instant) {
        self.entries.insert(key, CacheEntry { value, fetched_at, ttl });
    }

    /// Drop every entry that is no longer servable. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_fresh_at(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn stats_at(&self, now: Instant) -> TtlStats {
        let entries = self.entries.len();
        let stale_entries = self
            .entries
            .iter()
            .filter(|e| !e.value().is_fresh_at(now))
            .count();
        TtlStats { entries, stale_entries }
    }

    /// Count fresh values matching `pred`.
    pub fn count_fresh_where(&self, now: Instant, pred: impl Fn(&V) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|e| e.value().is_fresh_at(now) && pred(&e.value().value))
            .count()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
