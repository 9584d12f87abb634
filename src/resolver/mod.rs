pub mod pitcher;
pub mod predictions;

use futures_util::future::join_all;
use tracing::{debug, error, warn};

use crate::db::Store;
use crate::types::{ResolutionOutcome, ResolutionRow, RowWrite};

pub use pitcher::PitcherResolver;
pub use predictions::PredictionResolver;

/// Write a batch of resolutions: one transaction first, then concurrent per-row writes if the
/// transaction is rejected. Rows that fail stay pending and are retried by a later tick.
pub(crate) async fn persist_rows(store: &dyn Store, rows: &[ResolutionRow]) -> ResolutionOutcome {
    let attempted = rows.len();
    match store.batch_resolve(rows).await {
        Ok(()) => {
            return ResolutionOutcome {
                attempted,
                succeeded: attempted,
                failed: 0,
            }
        }
        Err(e) => warn!(rows = attempted, "Batch resolve rejected, falling back to per-row writes: {e}"),
    }

    let results = join_all(rows.iter().map(|row| store.resolve_one(row))).await;

    let mut outcome = ResolutionOutcome {
        attempted,
        ..ResolutionOutcome::default()
    };
    for (row, result) in rows.iter().zip(results) {
        match result {
            Ok(RowWrite::Written) => outcome.succeeded += 1,
            Ok(RowWrite::AlreadyResolved) => {
                debug!(prediction_id = row.prediction_id(), "Row already resolved, skipping");
                outcome.succeeded += 1;
            }
            Err(e) => {
                error!(
                    prediction_id = row.prediction_id(),
                    "Row resolve failed, left pending for next tick: {e}"
                );
                outcome.failed += 1;
            }
        }
    }
    outcome
}
