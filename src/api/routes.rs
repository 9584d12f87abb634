use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::health::{HealthSnapshot, HealthState};
use crate::api::latency::{LatencySummary, TickLatency};
use crate::db::Store;
use crate::error::AppError;
use crate::state::{CacheStats, GameStateCache, ResolvedEventTracker, TrackerStats};
use crate::sync::SyncScheduler;
use crate::types::{GameSnapshot, NewPitcherPrediction, NewPrediction, PitcherPrediction, Prediction};

#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<SyncScheduler>,
    pub store: Arc<dyn Store>,
    pub cache: Arc<GameStateCache>,
    pub events: Arc<ResolvedEventTracker>,
    pub pitchers: Arc<ResolvedEventTracker<u64>>,
    pub health: Arc<HealthState>,
    pub latency: Arc<TickLatency>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/games/:id", get(get_game))
        .route("/games/:id/track", post(track_game).delete(untrack_game))
        .route("/sync/start", post(start_sync))
        .route("/sync/stop", post(stop_sync))
        .route("/sync/trigger", post(trigger_sync))
        .route("/predictions", post(submit_prediction))
        .route("/pitcher-predictions", post(submit_pitcher_prediction))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub mode: &'static str,
    pub busy: bool,
    pub tracked_games: Vec<String>,
    pub sync: HealthSnapshot,
    pub cache: CacheStats,
    pub at_bat_tracker: TrackerStats,
    pub pitcher_tracker: TrackerStats,
    pub tick_latency: LatencySummary,
}

#[derive(Serialize)]
pub struct SyncStateResponse {
    /// Whether the call changed the scheduler's mode.
    pub changed: bool,
    pub polling: bool,
}

#[derive(Serialize)]
pub struct TrackResponse {
    pub game_id: String,
    pub added: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let polling = state.scheduler.is_polling().await;
    Json(HealthResponse {
        mode: if polling { "polling" } else { "idle" },
        busy: state.scheduler.is_busy(),
        tracked_games: state.scheduler.tracked_games(),
        sync: state.health.snapshot(),
        cache: state.cache.stats(),
        at_bat_tracker: state.events.stats(),
        pitcher_tracker: state.pitchers.stats(),
        tick_latency: state.latency.summary(),
    })
}

async fn get_game(
    State(state): State<ApiState>,
    Path(game_id): Path<String>,
) -> Result<Json<GameSnapshot>, AppError> {
    state
        .cache
        .get(&game_id)
        .map(|snapshot| Json(snapshot.as_ref().clone()))
        .ok_or_else(|| AppError::NotFound(format!("no fresh snapshot for game {game_id}")))
}

async fn track_game(State(state): State<ApiState>, Path(game_id): Path<String>) -> Json<TrackResponse> {
    let added = state.scheduler.track_game(&game_id);
    Json(TrackResponse { game_id, added })
}

async fn untrack_game(
    State(state): State<ApiState>,
    Path(game_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.scheduler.untrack_game(&game_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("game {game_id} is not tracked")))
    }
}

async fn start_sync(State(state): State<ApiState>) -> Json<SyncStateResponse> {
    let changed = state.scheduler.start().await;
    Json(SyncStateResponse { changed, polling: true })
}

async fn stop_sync(State(state): State<ApiState>) -> Json<SyncStateResponse> {
    let changed = state.scheduler.stop().await;
    Json(SyncStateResponse { changed, polling: false })
}

async fn trigger_sync(State(state): State<ApiState>) -> Response {
    match state.scheduler.trigger_once().await {
        Some(report) => Json(report).into_response(),
        None => (StatusCode::CONFLICT, "a sync tick is already running").into_response(),
    }
}

/// Closed once the at-bat is complete in the cached snapshot or already resolved. Accepting it
/// after resolution would leave a row the resolver never revisits.
fn ensure_at_bat_open(state: &ApiState, game_id: &str, event_index: u32) -> Result<(), AppError> {
    let complete = state
        .cache
        .get(game_id)
        .is_some_and(|s| s.event(event_index).is_some_and(|e| e.is_complete));
    if complete || state.events.is_resolved(game_id, event_index) {
        return Err(AppError::SubmissionClosed(format!(
            "at-bat {event_index} of game {game_id} is already complete"
        )));
    }
    Ok(())
}

fn ensure_pitcher_open(state: &ApiState, game_id: &str, pitcher_id: u64) -> Result<(), AppError> {
    let exited = state.cache.get(game_id).is_some_and(|s| {
        s.starters
            .iter()
            .any(|line| line.pitcher_id == pitcher_id && line.exited)
    });
    if exited || state.pitchers.is_resolved(game_id, pitcher_id) {
        return Err(AppError::SubmissionClosed(format!(
            "pitcher {pitcher_id} has already left game {game_id}"
        )));
    }
    Ok(())
}

async fn submit_prediction(
    State(state): State<ApiState>,
    Json(prediction): Json<NewPrediction>,
) -> Result<(StatusCode, Json<Prediction>), AppError> {
    ensure_at_bat_open(&state, &prediction.game_id, prediction.event_index)?;
    let stored = state.store.submit_prediction(&prediction).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn submit_pitcher_prediction(
    State(state): State<ApiState>,
    Json(prediction): Json<NewPitcherPrediction>,
) -> Result<(StatusCode, Json<PitcherPrediction>), AppError> {
    ensure_pitcher_open(&state, &prediction.game_id, prediction.pitcher_id)?;
    let stored = state.store.submit_pitcher_prediction(&prediction).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}
