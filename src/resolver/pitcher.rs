use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::db::Store;
use crate::error::Result;
use crate::resolver::persist_rows;
use crate::scorer::score_pitcher_line;
use crate::state::ResolvedEventTracker;
use crate::types::{now_ns, PitcherLine, PitcherPrediction, PitcherResolution, ResolutionOutcome, ResolutionRow};

/// Resolves starting-pitcher line predictions once the starter has left the game.
pub struct PitcherResolver {
    store: Arc<dyn Store>,
    tracker: Arc<ResolvedEventTracker<u64>>,
}

impl PitcherResolver {
    pub fn new(store: Arc<dyn Store>, tracker: Arc<ResolvedEventTracker<u64>>) -> Self {
        Self { store, tracker }
    }

    pub async fn resolve(&self, game_id: &str, line: &PitcherLine) -> Result<ResolutionOutcome> {
        let pending: Vec<PitcherPrediction> = self
            .store
            .pending_pitcher_predictions(game_id, line.pitcher_id)
            .await?
            .into_iter()
            .filter(PitcherPrediction::is_pending)
            .collect();

        if pending.is_empty() {
            self.tracker.mark_resolved(game_id, line.pitcher_id);
            debug!(game_id, pitcher_id = line.pitcher_id, "No pending pitcher predictions");
            return Ok(ResolutionOutcome::default());
        }

        let resolved_at = now_ns();
        let rows: Vec<ResolutionRow> = pending
            .iter()
            .map(|p| {
                ResolutionRow::Pitcher(PitcherResolution {
                    prediction_id: p.id,
                    actual: line.stats,
                    points_earned: score_pitcher_line(&p.predicted, &line.stats),
                    resolved_at,
                })
            })
            .collect();

        let result = persist_rows(self.store.as_ref(), &rows).await;
        if result.is_complete() {
            self.tracker.mark_resolved(game_id, line.pitcher_id);
        } else {
            warn!(game_id, pitcher_id = line.pitcher_id, failed = result.failed, "Pitcher line partially resolved");
        }

        info!(
            game_id,
            pitcher_id = line.pitcher_id,
            succeeded = result.succeeded,
            failed = result.failed,
            "RESOLVED pitcher {} ({} outs, {} K) | {}/{} predictions written",
            line.name,
            line.stats.outs,
            line.stats.strikeouts,
            result.succeeded,
            result.attempted,
        );
        Ok(result)
    }
}
