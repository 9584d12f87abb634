use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::{debug, info, warn};

use crate::config::STREAK_LOOKBACK;
use crate::db::Store;
use crate::error::Result;
use crate::resolver::persist_rows;
use crate::scorer::score_at_bat;
use crate::state::ResolvedEventTracker;
use crate::types::{now_ns, AtBatResolution, Outcome, Prediction, ResolutionOutcome, ResolutionRow};

/// Resolves every pending prediction on one completed at-bat, exactly once.
pub struct PredictionResolver {
    store: Arc<dyn Store>,
    tracker: Arc<ResolvedEventTracker>,
}

impl PredictionResolver {
    pub fn new(store: Arc<dyn Store>, tracker: Arc<ResolvedEventTracker>) -> Self {
        Self { store, tracker }
    }

    /// Store read errors propagate and leave the event unmarked. Write failures are counted in
    /// the returned outcome; the event is marked resolved only when every row landed.
    pub async fn resolve(&self, game_id: &str, event_index: u32, outcome: Outcome) -> Result<ResolutionOutcome> {
        let pending: Vec<Prediction> = self
            .store
            .pending_predictions(game_id, event_index)
            .await?
            .into_iter()
            .filter(Prediction::is_pending)
            .collect();

        if pending.is_empty() {
            self.tracker.mark_resolved(game_id, event_index);
            debug!(game_id, event_index, "No pending predictions; event marked resolved");
            return Ok(ResolutionOutcome::default());
        }

        let rows = self.build_rows(outcome, &pending).await?;
        let result = persist_rows(self.store.as_ref(), &rows).await;

        if result.is_complete() {
            self.tracker.mark_resolved(game_id, event_index);
        } else {
            warn!(
                game_id,
                event_index,
                failed = result.failed,
                "Event partially resolved; remaining predictions retry next tick"
            );
        }

        info!(
            game_id,
            event_index,
            outcome = %outcome,
            attempted = result.attempted,
            succeeded = result.succeeded,
            failed = result.failed,
            "RESOLVED at-bat {event_index} as {outcome} | {}/{} predictions written",
            result.succeeded,
            result.attempted,
        );
        Ok(result)
    }

    /// Score every pending prediction against its user's streak history.
    async fn build_rows(&self, outcome: Outcome, pending: &[Prediction]) -> Result<Vec<ResolutionRow>> {
        let histories = try_join_all(
            pending
                .iter()
                .map(|p| self.store.user_recent_resolved(&p.user_id, STREAK_LOOKBACK)),
        )
        .await?;

        let resolved_at = now_ns();
        let rows = pending
            .iter()
            .zip(histories)
            .map(|(prediction, recent)| {
                let score = score_at_bat(prediction, outcome, &recent);
                ResolutionRow::AtBat(AtBatResolution {
                    prediction_id: prediction.id,
                    actual_outcome: outcome,
                    is_correct: score.is_correct,
                    points_earned: score.points_earned,
                    streak_count: score.streak_count,
                    streak_bonus: score.streak_bonus,
                    resolved_at,
                })
            })
            .collect();
        Ok(rows)
    }
}
