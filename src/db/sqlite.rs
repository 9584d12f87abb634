use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};
use tracing::{error, info};

use crate::db::models::{PitcherPredictionRow, PredictionRow};
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::types::{
    now_ns, GameSnapshot, NewPitcherPrediction, NewPrediction, PitcherPrediction, Prediction, PredictionMode,
    ResolutionRow, RowWrite, SyncLogEntry,
};

const PREDICTION_COLUMNS: &str = "id, user_id, game_id, event_index, mode, predicted_outcome, \
     predicted_category, actual_outcome, is_correct, points_earned, streak_count, streak_bonus, \
     created_at, resolved_at";

const PITCHER_COLUMNS: &str = "id, user_id, game_id, pitcher_id, predicted_outs, \
     predicted_strikeouts, predicted_hits, predicted_earned_runs, predicted_walks, actual_outs, \
     actual_strikeouts, actual_hits, actual_earned_runs, actual_walks, points_earned, created_at, \
     resolved_at";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and apply migrations.
    pub async fn connect(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self::from_pool(pool).await?;
        info!("Database ready at {db_path}");
        Ok(store)
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Single-connection in-memory database; every connection to `:memory:` is a new database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }
}

/// Conditional update; returns rows affected (0 when the row was already resolved).
async fn apply_row<'e, E>(executor: E, row: &ResolutionRow) -> Result<u64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = match row {
        ResolutionRow::AtBat(r) => {
            sqlx::query(
                r#"
                UPDATE predictions
                SET actual_outcome = ?, is_correct = ?, points_earned = ?,
                    streak_count = ?, streak_bonus = ?, resolved_at = ?
                WHERE id = ? AND resolved_at IS NULL
                "#,
            )
            .bind(r.actual_outcome.as_str())
            .bind(r.is_correct)
            .bind(r.points_earned)
            .bind(i64::from(r.streak_count))
            .bind(r.streak_bonus)
            .bind(r.resolved_at)
            .bind(r.prediction_id)
            .execute(executor)
            .await?
        }
        ResolutionRow::Pitcher(r) => {
            sqlx::query(
                r#"
                UPDATE pitcher_predictions
                SET actual_outs = ?, actual_strikeouts = ?, actual_hits = ?,
                    actual_earned_runs = ?, actual_walks = ?, points_earned = ?, resolved_at = ?
                WHERE id = ? AND resolved_at IS NULL
                "#,
            )
            .bind(i64::from(r.actual.outs))
            .bind(i64::from(r.actual.strikeouts))
            .bind(i64::from(r.actual.hits))
            .bind(i64::from(r.actual.earned_runs))
            .bind(i64::from(r.actual.walks))
            .bind(r.points_earned)
            .bind(r.resolved_at)
            .bind(r.prediction_id)
            .execute(executor)
            .await?
        }
    };
    Ok(result.rows_affected())
}

/// Undecodable rows are logged and skipped so one bad row can't stall every read of its event.
fn decode_predictions(rows: Vec<PredictionRow>) -> Vec<Prediction> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match Prediction::try_from(row) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!(prediction_id = id, "Skipping undecodable prediction row: {e}");
                    None
                }
            }
        })
        .collect()
}

/// SQLite integers are signed; ids past `i64::MAX` can't be stored.
fn pitcher_key(pitcher_id: u64) -> Result<i64> {
    i64::try_from(pitcher_id)
        .map_err(|_| AppError::InvalidPrediction(format!("pitcher_id {pitcher_id} is out of range")))
}

fn validate(prediction: &NewPrediction) -> Result<()> {
    match prediction.mode {
        PredictionMode::Exact if prediction.predicted_outcome.is_none() => Err(
            AppError::InvalidPrediction("exact mode requires predicted_outcome".to_string()),
        ),
        PredictionMode::Category if prediction.predicted_category.is_none() => Err(
            AppError::InvalidPrediction("category mode requires predicted_category".to_string()),
        ),
        _ => Ok(()),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn pending_predictions(&self, game_id: &str, event_index: u32) -> Result<Vec<Prediction>> {
        let sql = format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions \
             WHERE game_id = ? AND event_index = ? AND resolved_at IS NULL ORDER BY id"
        );
        let rows: Vec<PredictionRow> = sqlx::query_as(&sql)
            .bind(game_id)
            .bind(i64::from(event_index))
            .fetch_all(&self.pool)
            .await?;
        Ok(decode_predictions(rows))
    }

    async fn user_recent_resolved(&self, user_id: &str, limit: u32) -> Result<Vec<Prediction>> {
        let sql = format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions \
             WHERE user_id = ? AND resolved_at IS NOT NULL \
             ORDER BY resolved_at DESC, event_index DESC LIMIT ?"
        );
        let rows: Vec<PredictionRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(decode_predictions(rows))
    }

    async fn resolved_event_indices(&self, game_id: &str) -> Result<Vec<u32>> {
        let indices: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT event_index FROM predictions
            WHERE game_id = ?
            GROUP BY event_index
            HAVING SUM(CASE WHEN resolved_at IS NULL THEN 1 ELSE 0 END) = 0
            ORDER BY event_index
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(indices.into_iter().filter_map(|i| u32::try_from(i).ok()).collect())
    }

    async fn pending_pitcher_predictions(&self, game_id: &str, pitcher_id: u64) -> Result<Vec<PitcherPrediction>> {
        let sql = format!(
            "SELECT {PITCHER_COLUMNS} FROM pitcher_predictions \
             WHERE game_id = ? AND pitcher_id = ? AND resolved_at IS NULL ORDER BY id"
        );
        let rows: Vec<PitcherPredictionRow> = sqlx::query_as(&sql)
            .bind(game_id)
            .bind(pitcher_key(pitcher_id)?)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PitcherPrediction::from).collect())
    }

    async fn resolved_pitcher_ids(&self, game_id: &str) -> Result<Vec<u64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT pitcher_id FROM pitcher_predictions
            WHERE game_id = ?
            GROUP BY pitcher_id
            HAVING SUM(CASE WHEN resolved_at IS NULL THEN 1 ELSE 0 END) = 0
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().filter_map(|i| u64::try_from(i).ok()).collect())
    }

    async fn batch_resolve(&self, rows: &[ResolutionRow]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            let affected = apply_row(&mut *tx, row).await?;
            if affected == 0 {
                tx.rollback().await?;
                return Err(AppError::PersistenceConflict(format!(
                    "prediction {} was already resolved",
                    row.prediction_id()
                )));
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn resolve_one(&self, row: &ResolutionRow) -> Result<RowWrite> {
        match apply_row(&self.pool, row).await? {
            0 => Ok(RowWrite::AlreadyResolved),
            _ => Ok(RowWrite::Written),
        }
    }

    async fn submit_prediction(&self, prediction: &NewPrediction) -> Result<Prediction> {
        validate(prediction)?;
        let created_at = now_ns();
        let inserted = sqlx::query(
            r#"
            INSERT INTO predictions (user_id, game_id, event_index, mode, predicted_outcome, predicted_category, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&prediction.user_id)
        .bind(&prediction.game_id)
        .bind(i64::from(prediction.event_index))
        .bind(prediction.mode.as_str())
        .bind(prediction.predicted_outcome.map(|o| o.as_str()))
        .bind(prediction.predicted_category.map(|c| c.as_str()))
        .bind(created_at)
        .execute(&self.pool)
        .await;

        let result = match inserted {
            Ok(r) => r,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(AppError::DuplicatePrediction {
                    user_id: prediction.user_id.clone(),
                    game_id: prediction.game_id.clone(),
                    event_key: prediction.event_index.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Prediction {
            id: result.last_insert_rowid(),
            user_id: prediction.user_id.clone(),
            game_id: prediction.game_id.clone(),
            event_index: prediction.event_index,
            mode: prediction.mode,
            predicted_outcome: prediction.predicted_outcome,
            predicted_category: prediction.predicted_category,
            actual_outcome: None,
            is_correct: None,
            points_earned: 0,
            streak_count: 0,
            streak_bonus: 0,
            created_at,
            resolved_at: None,
        })
    }

    async fn submit_pitcher_prediction(&self, prediction: &NewPitcherPrediction) -> Result<PitcherPrediction> {
        let pitcher_id = pitcher_key(prediction.pitcher_id)?;
        let created_at = now_ns();
        let p = &prediction.predicted;
        let inserted = sqlx::query(
            r#"
            INSERT INTO pitcher_predictions (
                user_id, game_id, pitcher_id, predicted_outs, predicted_strikeouts,
                predicted_hits, predicted_earned_runs, predicted_walks, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&prediction.user_id)
        .bind(&prediction.game_id)
        .bind(pitcher_id)
        .bind(i64::from(p.outs))
        .bind(i64::from(p.strikeouts))
        .bind(i64::from(p.hits))
        .bind(i64::from(p.earned_runs))
        .bind(i64::from(p.walks))
        .bind(created_at)
        .execute(&self.pool)
        .await;

        let result = match inserted {
            Ok(r) => r,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(AppError::DuplicatePrediction {
                    user_id: prediction.user_id.clone(),
                    game_id: prediction.game_id.clone(),
                    event_key: format!("pitcher {}", prediction.pitcher_id),
                })
            }
            Err(e) => return Err(e.into()),
        };

        Ok(PitcherPrediction {
            id: result.last_insert_rowid(),
            user_id: prediction.user_id.clone(),
            game_id: prediction.game_id.clone(),
            pitcher_id: prediction.pitcher_id,
            predicted: prediction.predicted,
            actual: None,
            points_earned: 0,
            created_at,
            resolved_at: None,
        })
    }

    async fn upsert_snapshot(&self, snapshot: &GameSnapshot) -> Result<()> {
        let payload = serde_json::to_string(snapshot)?;
        sqlx::query(
            r#"
            INSERT INTO cached_snapshots (game_id, status, payload, fetched_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(game_id) DO UPDATE SET
                status = excluded.status,
                payload = excluded.payload,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(&snapshot.game_id)
        .bind(snapshot.status.as_str())
        .bind(payload)
        .bind(now_ns())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_sync_log(&self, entry: &SyncLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_log (
                started_at, finished_at, games_polled, fetch_failures, candidates,
                predictions_resolved, predictions_failed, note
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.started_at_ns)
        .bind(entry.finished_at_ns)
        .bind(i64::from(entry.games_polled))
        .bind(i64::from(entry.fetch_failures))
        .bind(i64::from(entry.candidates))
        .bind(i64::from(entry.predictions_resolved))
        .bind(i64::from(entry.predictions_failed))
        .bind(entry.note.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AtBatResolution, Outcome, OutcomeCategory, PitcherResolution, PitcherStats};

    fn exact(user: &str, event_index: u32, outcome: Outcome) -> NewPrediction {
        NewPrediction {
            user_id: user.to_string(),
            game_id: "745001".to_string(),
            event_index,
            mode: PredictionMode::Exact,
            predicted_outcome: Some(outcome),
            predicted_category: None,
        }
    }

    fn at_bat_row(prediction_id: i64, resolved_at: i64) -> ResolutionRow {
        ResolutionRow::AtBat(AtBatResolution {
            prediction_id,
            actual_outcome: Outcome::Strikeout,
            is_correct: true,
            points_earned: 3,
            streak_count: 1,
            streak_bonus: 0,
            resolved_at,
        })
    }

    #[tokio::test]
    async fn duplicate_submission_is_rejected() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.submit_prediction(&exact("u1", 42, Outcome::Strikeout)).await.unwrap();

        let err = store
            .submit_prediction(&exact("u1", 42, Outcome::Walk))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicatePrediction { .. }), "got {err:?}");

        // Different user, same event is fine.
        store.submit_prediction(&exact("u2", 42, Outcome::Walk)).await.unwrap();
    }

    #[tokio::test]
    async fn mode_requires_matching_field() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut p = exact("u1", 1, Outcome::Single);
        p.mode = PredictionMode::Category;
        let err = store.submit_prediction(&p).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidPrediction(_)));

        p.predicted_category = Some(OutcomeCategory::Hit);
        store.submit_prediction(&p).await.unwrap();
    }

    #[tokio::test]
    async fn resolve_one_writes_once() {
        let store = SqliteStore::in_memory().await.unwrap();
        let p = store.submit_prediction(&exact("u1", 42, Outcome::Strikeout)).await.unwrap();

        assert_eq!(store.resolve_one(&at_bat_row(p.id, 100)).await.unwrap(), RowWrite::Written);
        assert_eq!(
            store.resolve_one(&at_bat_row(p.id, 200)).await.unwrap(),
            RowWrite::AlreadyResolved
        );

        let recent = store.user_recent_resolved("u1", 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].resolved_at, Some(100), "second write must not land");
        assert_eq!(recent[0].actual_outcome, Some(Outcome::Strikeout));
        assert!(store.pending_predictions("745001", 42).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let store = SqliteStore::in_memory().await.unwrap();
        let a = store.submit_prediction(&exact("u1", 5, Outcome::Single)).await.unwrap();
        let b = store.submit_prediction(&exact("u2", 5, Outcome::Single)).await.unwrap();
        store.resolve_one(&at_bat_row(b.id, 50)).await.unwrap();

        let err = store
            .batch_resolve(&[at_bat_row(a.id, 60), at_bat_row(b.id, 60)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PersistenceConflict(_)));

        let pending = store.pending_predictions("745001", 5).await.unwrap();
        assert_eq!(pending.len(), 1, "first row must have been rolled back");
        assert_eq!(pending[0].id, a.id);
    }

    #[tokio::test]
    async fn resolved_indices_exclude_partially_resolved_events() {
        let store = SqliteStore::in_memory().await.unwrap();
        let a = store.submit_prediction(&exact("u1", 1, Outcome::Single)).await.unwrap();
        let b = store.submit_prediction(&exact("u1", 2, Outcome::Single)).await.unwrap();
        store.submit_prediction(&exact("u2", 2, Outcome::Single)).await.unwrap();
        store.submit_prediction(&exact("u1", 3, Outcome::Single)).await.unwrap();

        store.batch_resolve(&[at_bat_row(a.id, 10), at_bat_row(b.id, 11)]).await.unwrap();

        assert_eq!(store.resolved_event_indices("745001").await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn recent_resolved_is_newest_first() {
        let store = SqliteStore::in_memory().await.unwrap();
        let first = store.submit_prediction(&exact("u1", 1, Outcome::Single)).await.unwrap();
        let second = store.submit_prediction(&exact("u1", 2, Outcome::Single)).await.unwrap();
        store.resolve_one(&at_bat_row(first.id, 10)).await.unwrap();
        store.resolve_one(&at_bat_row(second.id, 20)).await.unwrap();

        let recent = store.user_recent_resolved("u1", 10).await.unwrap();
        let order: Vec<i64> = recent.iter().map(|p| p.id).collect();
        assert_eq!(order, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn undecodable_row_is_skipped_not_fatal() {
        let store = SqliteStore::in_memory().await.unwrap();
        let good = store.submit_prediction(&exact("u1", 7, Outcome::Walk)).await.unwrap();
        sqlx::query(
            "INSERT INTO predictions (user_id, game_id, event_index, mode, predicted_outcome, created_at) \
             VALUES ('u2', '745001', 7, 'exact', 'eephus_pop', 0)",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let pending = store.pending_predictions("745001", 7).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, good.id);
    }

    #[tokio::test]
    async fn out_of_range_pitcher_id_is_rejected() {
        let store = SqliteStore::in_memory().await.unwrap();
        let err = store
            .submit_pitcher_prediction(&NewPitcherPrediction {
                user_id: "u1".to_string(),
                game_id: "745001".to_string(),
                pitcher_id: u64::MAX,
                predicted: PitcherStats::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidPrediction(_)), "got {err:?}");
        assert!(store.pending_pitcher_predictions("745001", u64::MAX).await.is_err());
    }

    #[tokio::test]
    async fn pitcher_predictions_round_trip_through_resolution() {
        let store = SqliteStore::in_memory().await.unwrap();
        let line = PitcherStats { outs: 18, strikeouts: 7, hits: 5, earned_runs: 2, walks: 1 };
        let p = store
            .submit_pitcher_prediction(&NewPitcherPrediction {
                user_id: "u1".to_string(),
                game_id: "745001".to_string(),
                pitcher_id: 605_400,
                predicted: line,
            })
            .await
            .unwrap();

        let row = ResolutionRow::Pitcher(PitcherResolution {
            prediction_id: p.id,
            actual: line,
            points_earned: 150,
            resolved_at: 99,
        });
        store.batch_resolve(&[row]).await.unwrap();

        assert!(store.pending_pitcher_predictions("745001", 605_400).await.unwrap().is_empty());
        assert_eq!(store.resolved_pitcher_ids("745001").await.unwrap(), vec![605_400]);
    }
}
