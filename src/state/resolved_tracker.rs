use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub games: usize,
    pub initialized_games: usize,
    pub resolved_keys: usize,
}

/// In-memory record of which (game, key) pairs have been fully resolved.
///
/// Only a shortcut in front of the store: a miss means "check the store", never "unresolved".
/// `K` is the at-bat index for event predictions and the pitcher id for pitcher lines.
pub struct ResolvedEventTracker<K = u32> {
    resolved: DashMap<String, HashSet<K>>,
    /// Games whose set has been seeded from durable state in this process.
    initialized: DashSet<String>,
}

impl<K> ResolvedEventTracker<K>
where
    K: Eq + Hash + Copy,
{
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_resolved(&self, game_id: &str, key: K) -> bool {
        self.resolved
            .get(game_id)
            .is_some_and(|set| set.contains(&key))
    }

    /// Returns true only for the caller that inserted the key. The shard lock held by `entry`
    /// makes check-and-insert atomic.
    pub fn mark_resolved(&self, game_id: &str, key: K) -> bool {
        self.resolved
            .entry(game_id.to_string())
            .or_default()
            .insert(key)
    }

    /// Seed a game's set from the store. Merges with anything marked in the meantime.
    pub fn initialize(&self, game_id: &str, already_resolved: impl IntoIterator<Item = K>) {
        self.resolved
            .entry(game_id.to_string())
            .or_default()
            .extend(already_resolved);
        self.initialized.insert(game_id.to_string());
    }

    pub fn is_initialized(&self, game_id: &str) -> bool {
        self.initialized.contains(game_id)
    }

    /// Drop a game entirely; the next touch re-seeds it from the store.
    pub fn forget(&self, game_id: &str) {
        self.resolved.remove(game_id);
        self.initialized.remove(game_id);
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            games: self.resolved.len(),
            initialized_games: self.initialized.len(),
            resolved_keys: self.resolved.iter().map(|e| e.value().len()).sum(),
        }
    }
}

impl<K> Default for ResolvedEventTracker<K>
where
    K: Eq + Hash + Copy,
{
    fn default() -> Self {
        Self {
            resolved: DashMap::new(),
            initialized: DashSet::new(),
        }
    }
}
