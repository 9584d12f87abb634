pub mod client;
pub mod parse;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::GameSnapshot;

pub use client::HttpFeedClient;

/// Source of fresh game state.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// `Ok(None)` when the upstream has no such game; errors are transient network failures.
    async fn fetch_snapshot(&self, game_id: &str) -> Result<Option<GameSnapshot>>;
}
