//! In-memory collaborators with failure injection for resolver and scheduler tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::feed::FeedClient;
use crate::types::{
    EventContext, EventRecord, GameSnapshot, GameStatus, NewPitcherPrediction, NewPrediction,
    Outcome, PitcherLine, PitcherPrediction, PitcherStats, Prediction, PredictionMode, ResolutionRow,
    RowWrite, SyncLogEntry, TeamSide,
};

#[derive(Default)]
pub struct MemoryStore {
    predictions: Mutex<Vec<Prediction>>,
    pitcher_predictions: Mutex<Vec<PitcherPrediction>>,
    pub snapshots: Mutex<HashMap<String, GameSnapshot>>,
    pub sync_log: Mutex<Vec<SyncLogEntry>>,
    next_id: AtomicI64,
    /// Reject every batch write.
    pub fail_batches: AtomicBool,
    /// Reject every read (store unavailable).
    pub fail_reads: AtomicBool,
    /// Prediction ids whose next per-row write fails once.
    fail_rows_once: Mutex<HashSet<i64>>,
    /// Event indices whose pending read fails to decode, every time.
    pub corrupt_events: Mutex<HashSet<u32>>,
    pub pending_reads: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub row_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn seed(&self, user: &str, game: &str, event_index: u32, guess: Outcome) -> i64 {
        let id = self.next_id();
        self.predictions.lock().unwrap().push(Prediction {
            id,
            user_id: user.to_string(),
            game_id: game.to_string(),
            event_index,
            mode: PredictionMode::Exact,
            predicted_outcome: Some(guess),
            predicted_category: None,
            actual_outcome: None,
            is_correct: None,
            points_earned: 0,
            streak_count: 0,
            streak_bonus: 0,
            created_at: 0,
            resolved_at: None,
        });
        id
    }

    pub fn seed_pitcher(&self, user: &str, game: &str, pitcher_id: u64, predicted: PitcherStats) -> i64 {
        let id = self.next_id();
        self.pitcher_predictions.lock().unwrap().push(PitcherPrediction {
            id,
            user_id: user.to_string(),
            game_id: game.to_string(),
            pitcher_id,
            predicted,
            actual: None,
            points_earned: 0,
            created_at: 0,
            resolved_at: None,
        });
        id
    }

    pub fn fail_row_once(&self, prediction_id: i64) {
        self.fail_rows_once.lock().unwrap().insert(prediction_id);
    }

    pub fn prediction(&self, id: i64) -> Prediction {
        self.predictions
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .expect("prediction exists")
    }

    pub fn all_predictions(&self) -> Vec<Prediction> {
        self.predictions.lock().unwrap().clone()
    }

    pub fn pitcher_prediction(&self, id: i64) -> PitcherPrediction {
        self.pitcher_predictions
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .expect("pitcher prediction exists")
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    /// Apply if still pending. Returns false when already resolved.
    fn apply(&self, row: &ResolutionRow) -> bool {
        match row {
            ResolutionRow::AtBat(r) => {
                let mut predictions = self.predictions.lock().unwrap();
                match predictions.iter_mut().find(|p| p.id == r.prediction_id) {
                    Some(p) if p.resolved_at.is_none() => {
                        p.actual_outcome = Some(r.actual_outcome);
                        p.is_correct = Some(r.is_correct);
                        p.points_earned = r.points_earned;
                        p.streak_count = r.streak_count;
                        p.streak_bonus = r.streak_bonus;
                        p.resolved_at = Some(r.resolved_at);
                        true
                    }
                    _ => false,
                }
            }
            ResolutionRow::Pitcher(r) => {
                let mut predictions = self.pitcher_predictions.lock().unwrap();
                match predictions.iter_mut().find(|p| p.id == r.prediction_id) {
                    Some(p) if p.resolved_at.is_none() => {
                        p.actual = Some(r.actual);
                        p.points_earned = r.points_earned;
                        p.resolved_at = Some(r.resolved_at);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    fn is_pending(&self, row: &ResolutionRow) -> bool {
        match row {
            ResolutionRow::AtBat(r) => self
                .predictions
                .lock()
                .unwrap()
                .iter()
                .any(|p| p.id == r.prediction_id && p.resolved_at.is_none()),
            ResolutionRow::Pitcher(r) => self
                .pitcher_predictions
                .lock()
                .unwrap()
                .iter()
                .any(|p| p.id == r.prediction_id && p.resolved_at.is_none()),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn pending_predictions(&self, game_id: &str, event_index: u32) -> Result<Vec<Prediction>> {
        self.check_reads()?;
        self.pending_reads.fetch_add(1, Ordering::SeqCst);
        if self.corrupt_events.lock().unwrap().contains(&event_index) {
            return Err(AppError::Database(sqlx::Error::Decode(
                format!("unrecognized predicted_outcome on event {event_index}").into(),
            )));
        }
        Ok(self
            .predictions
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.game_id == game_id && p.event_index == event_index && p.is_pending())
            .cloned()
            .collect())
    }

    async fn user_recent_resolved(&self, user_id: &str, limit: u32) -> Result<Vec<Prediction>> {
        self.check_reads()?;
        let mut resolved: Vec<Prediction> = self
            .predictions
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id && p.resolved_at.is_some())
            .cloned()
            .collect();
        resolved.sort_by(|a, b| {
            b.resolved_at
                .cmp(&a.resolved_at)
                .then(b.event_index.cmp(&a.event_index))
        });
        resolved.truncate(limit as usize);
        Ok(resolved)
    }

    async fn resolved_event_indices(&self, game_id: &str) -> Result<Vec<u32>> {
        self.check_reads()?;
        let predictions = self.predictions.lock().unwrap();
        let mut by_event: HashMap<u32, bool> = HashMap::new();
        for p in predictions.iter().filter(|p| p.game_id == game_id) {
            let all_resolved = by_event.entry(p.event_index).or_insert(true);
            *all_resolved &= !p.is_pending();
        }
        let mut indices: Vec<u32> = by_event
            .into_iter()
            .filter_map(|(idx, done)| done.then_some(idx))
            .collect();
        indices.sort_unstable();
        Ok(indices)
    }

    async fn pending_pitcher_predictions(&self, game_id: &str, pitcher_id: u64) -> Result<Vec<PitcherPrediction>> {
        self.check_reads()?;
        Ok(self
            .pitcher_predictions
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.game_id == game_id && p.pitcher_id == pitcher_id && p.is_pending())
            .cloned()
            .collect())
    }

    async fn resolved_pitcher_ids(&self, game_id: &str) -> Result<Vec<u64>> {
        self.check_reads()?;
        let predictions = self.pitcher_predictions.lock().unwrap();
        let mut by_pitcher: HashMap<u64, bool> = HashMap::new();
        for p in predictions.iter().filter(|p| p.game_id == game_id) {
            let all_resolved = by_pitcher.entry(p.pitcher_id).or_insert(true);
            *all_resolved &= !p.is_pending();
        }
        Ok(by_pitcher
            .into_iter()
            .filter_map(|(id, done)| done.then_some(id))
            .collect())
    }

    async fn batch_resolve(&self, rows: &[ResolutionRow]) -> Result<()> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(AppError::PersistenceConflict("batch rejected".to_string()));
        }
        if let Some(row) = rows.iter().find(|r| !self.is_pending(r)) {
            return Err(AppError::PersistenceConflict(format!(
                "prediction {} was already resolved",
                row.prediction_id()
            )));
        }
        for row in rows {
            self.apply(row);
        }
        Ok(())
    }

    async fn resolve_one(&self, row: &ResolutionRow) -> Result<RowWrite> {
        self.row_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_rows_once.lock().unwrap().remove(&row.prediction_id()) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        if self.apply(row) {
            Ok(RowWrite::Written)
        } else {
            Ok(RowWrite::AlreadyResolved)
        }
    }

    async fn submit_prediction(&self, prediction: &NewPrediction) -> Result<Prediction> {
        let mut predictions = self.predictions.lock().unwrap();
        if predictions.iter().any(|p| {
            p.user_id == prediction.user_id
                && p.game_id == prediction.game_id
                && p.event_index == prediction.event_index
        }) {
            return Err(AppError::DuplicatePrediction {
                user_id: prediction.user_id.clone(),
                game_id: prediction.game_id.clone(),
                event_key: prediction.event_index.to_string(),
            });
        }
        let stored = Prediction {
            id: self.next_id(),
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
            created_at: 0,
            resolved_at: None,
        };
        predictions.push(stored.clone());
        Ok(stored)
    }

    async fn submit_pitcher_prediction(&self, prediction: &NewPitcherPrediction) -> Result<PitcherPrediction> {
        let duplicate = self.pitcher_predictions.lock().unwrap().iter().any(|p| {
            p.user_id == prediction.user_id
                && p.game_id == prediction.game_id
                && p.pitcher_id == prediction.pitcher_id
        });
        if duplicate {
            return Err(AppError::DuplicatePrediction {
                user_id: prediction.user_id.clone(),
                game_id: prediction.game_id.clone(),
                event_key: format!("pitcher {}", prediction.pitcher_id),
            });
        }
        let id = self.seed_pitcher(
            &prediction.user_id,
            &prediction.game_id,
            prediction.pitcher_id,
            prediction.predicted,
        );
        Ok(self.pitcher_prediction(id))
    }

    async fn upsert_snapshot(&self, snapshot: &GameSnapshot) -> Result<()> {
        self.snapshots
            .lock()
            .unwrap()
            .insert(snapshot.game_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn append_sync_log(&self, entry: &SyncLogEntry) -> Result<()> {
        self.sync_log.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// One scripted response from [`ScriptedFeed`].
pub enum FeedStep {
    Snapshot(GameSnapshot),
    /// Sleep this long before answering; used to trip the fetch timeout.
    Hang(Duration),
    Fail,
    NoGame,
}

/// Feed that replays queued steps per game; repeats the last snapshot once the queue drains.
#[derive(Default)]
pub struct ScriptedFeed {
    steps: Mutex<HashMap<String, VecDeque<FeedStep>>>,
    last: Mutex<HashMap<String, GameSnapshot>>,
    pub calls: AtomicUsize,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, game_id: &str, step: FeedStep) {
        self.steps
            .lock()
            .unwrap()
            .entry(game_id.to_string())
            .or_default()
            .push_back(step);
    }
}

#[async_trait]
impl FeedClient for ScriptedFeed {
    async fn fetch_snapshot(&self, game_id: &str) -> Result<Option<GameSnapshot>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .unwrap()
            .get_mut(game_id)
            .and_then(VecDeque::pop_front);
        match step {
            Some(FeedStep::Snapshot(s)) => {
                self.last.lock().unwrap().insert(game_id.to_string(), s.clone());
                Ok(Some(s))
            }
            Some(FeedStep::Hang(d)) => {
                tokio::time::sleep(d).await;
                Err(AppError::TransientUpstream("hung".to_string()))
            }
            Some(FeedStep::Fail) => Err(AppError::TransientUpstream("connection reset".to_string())),
            Some(FeedStep::NoGame) => Ok(None),
            None => Ok(self.last.lock().unwrap().get(game_id).cloned()),
        }
    }
}

pub fn event(index: u32, outcome: Option<Outcome>) -> EventRecord {
    EventRecord {
        index,
        is_complete: outcome.is_some(),
        outcome,
        context: EventContext::default(),
    }
}

pub fn snapshot(game_id: &str, status: GameStatus, events: Vec<EventRecord>) -> GameSnapshot {
    GameSnapshot {
        game_id: game_id.to_string(),
        status,
        events,
        current_event: None,
        starters: Vec::new(),
    }
}

pub fn starter(pitcher_id: u64, stats: PitcherStats, exited: bool) -> PitcherLine {
    PitcherLine {
        pitcher_id,
        name: format!("Pitcher {pitcher_id}"),
        side: TeamSide::Home,
        stats,
        exited,
    }
}
