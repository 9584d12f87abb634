pub mod game_cache;
pub mod resolved_tracker;
pub mod ttl_cache;

pub use game_cache::{CacheStats, GameStateCache};
pub use resolved_tracker::{ResolvedEventTracker, TrackerStats};
