use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::state::ttl_cache::TtlCache;
use crate::types::GameSnapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub live_entries: usize,
    pub stale_entries: usize,
}

/// Latest snapshot per game. A snapshot's own status picks its TTL: short while live, long
/// otherwise. No merging: the newest fetch replaces whatever was there.
pub struct GameStateCache {
    snapshots: TtlCache<String, Arc<GameSnapshot>>,
    live_ttl: Duration,
    idle_ttl: Duration,
}

impl GameStateCache {
    pub fn new(live_ttl: Duration, idle_ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            snapshots: TtlCache::new(),
            live_ttl,
            idle_ttl,
        })
    }

    pub fn ttl_for(&self, snapshot: &GameSnapshot) -> Duration {
        if snapshot.status.is_live() {
            self.live_ttl
        } else {
            self.idle_ttl
        }
    }

    /// Cached snapshot, or None if never fetched or expired. None means "go upstream".
    pub fn get(&self, game_id: &str) -> Option<Arc<GameSnapshot>> {
        self.get_at(game_id, Instant::now())
    }

    pub fn get_at(&self, game_id: &str, now: Instant) -> Option<Arc<GameSnapshot>> {
        self.snapshots.get_at(&game_id.to_string(), now)
    }

    pub fn put(&self, game_id: &str, snapshot: GameSnapshot) -> Arc<GameSnapshot> {
        self.put_at(game_id, snapshot, Instant::now())
    }

    pub fn put_at(&self, game_id: &str, snapshot: GameSnapshot, fetched_at: Instant) -> Arc<GameSnapshot> {
        let ttl = self.ttl_for(&snapshot);
        let snapshot = Arc::new(snapshot);
        self.snapshots
            .put_at(game_id.to_string(), Arc::clone(&snapshot), ttl, fetched_at);
        snapshot
    }

    /// Drop expired snapshots, including those of games no longer tracked.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        self.snapshots.purge_expired(now)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats_at(Instant::now())
    }

    pub fn stats_at(&self, now: Instant) -> CacheStats {
        let base = self.snapshots.stats_at(now);
        CacheStats {
            entries: base.entries,
            live_entries: self.snapshots.count_fresh_where(now, |s| s.status.is_live()),
            stale_entries: base.stale_entries,
        }
    }
}
