pub mod models;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    GameSnapshot, NewPitcherPrediction, NewPrediction, PitcherPrediction, Prediction, ResolutionRow,
    RowWrite, SyncLogEntry,
};

pub use sqlite::SqliteStore;

/// Durable state consumed by the resolvers and the scheduler.
#[async_trait]
pub trait Store: Send + Sync {
    /// Predictions for one at-bat still awaiting resolution. Callers re-check `resolved_at`.
    async fn pending_predictions(&self, game_id: &str, event_index: u32) -> Result<Vec<Prediction>>;

    /// A user's resolved predictions, newest first.
    async fn user_recent_resolved(&self, user_id: &str, limit: u32) -> Result<Vec<Prediction>>;

    /// Event indices with at least one resolved prediction and none pending.
    async fn resolved_event_indices(&self, game_id: &str) -> Result<Vec<u32>>;

    async fn pending_pitcher_predictions(&self, game_id: &str, pitcher_id: u64) -> Result<Vec<PitcherPrediction>>;

    async fn resolved_pitcher_ids(&self, game_id: &str) -> Result<Vec<u64>>;

    /// All-or-nothing. Any already-resolved or failing row rolls the whole batch back.
    async fn batch_resolve(&self, rows: &[ResolutionRow]) -> Result<()>;

    /// Single conditional write; an already-resolved row is `RowWrite::AlreadyResolved`.
    async fn resolve_one(&self, row: &ResolutionRow) -> Result<RowWrite>;

    /// Rejects a second prediction for the same (user, game, event).
    async fn submit_prediction(&self, prediction: &NewPrediction) -> Result<Prediction>;

    async fn submit_pitcher_prediction(&self, prediction: &NewPitcherPrediction) -> Result<PitcherPrediction>;

    async fn upsert_snapshot(&self, snapshot: &GameSnapshot) -> Result<()>;

    async fn append_sync_log(&self, entry: &SyncLogEntry) -> Result<()>;
}
