//! Row types for the tables in `migrations/`, converted into the domain model on read.
use crate::error::{AppError, Result};
use crate::types::{
    Outcome, OutcomeCategory, PitcherPrediction, PitcherStats, Prediction, PredictionMode,
};

#[derive(Debug, sqlx::FromRow)]
pub struct PredictionRow {
    pub id: i64,
    pub user_id: String,
    pub game_id: String,
    pub event_index: i64,
    pub mode: String,
    pub predicted_outcome: Option<String>,
    pub predicted_category: Option<String>,
    pub actual_outcome: Option<String>,
    pub is_correct: Option<bool>,
    pub points_earned: i64,
    pub streak_count: i64,
    pub streak_bonus: i64,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

impl TryFrom<PredictionRow> for Prediction {
    type Error = AppError;

    fn try_from(row: PredictionRow) -> Result<Self> {
        let mode = PredictionMode::parse(&row.mode)
            .ok_or_else(|| corrupt(row.id, "mode", &row.mode))?;
        Ok(Prediction {
            id: row.id,
            user_id: row.user_id,
            game_id: row.game_id,
            event_index: u32::try_from(row.event_index)
                .map_err(|_| corrupt(row.id, "event_index", &row.event_index.to_string()))?,
            mode,
            predicted_outcome: parse_opt(row.id, "predicted_outcome", row.predicted_outcome, Outcome::parse)?,
            predicted_category: parse_opt(
                row.id,
                "predicted_category",
                row.predicted_category,
                OutcomeCategory::parse,
            )?,
            actual_outcome: parse_opt(row.id, "actual_outcome", row.actual_outcome, Outcome::parse)?,
            is_correct: row.is_correct,
            points_earned: row.points_earned,
            streak_count: row.streak_count.max(0) as u32,
            streak_bonus: row.streak_bonus,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PitcherPredictionRow {
    pub id: i64,
    pub user_id: String,
    pub game_id: String,
    pub pitcher_id: i64,
    pub predicted_outs: i64,
    pub predicted_strikeouts: i64,
    pub predicted_hits: i64,
    pub predicted_earned_runs: i64,
    pub predicted_walks: i64,
    pub actual_outs: Option<i64>,
    pub actual_strikeouts: Option<i64>,
    pub actual_hits: Option<i64>,
    pub actual_earned_runs: Option<i64>,
    pub actual_walks: Option<i64>,
    pub points_earned: i64,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

impl From<PitcherPredictionRow> for PitcherPrediction {
    fn from(row: PitcherPredictionRow) -> Self {
        let actual = match (
            row.actual_outs,
            row.actual_strikeouts,
            row.actual_hits,
            row.actual_earned_runs,
            row.actual_walks,
        ) {
            (Some(outs), Some(strikeouts), Some(hits), Some(earned_runs), Some(walks)) => {
                Some(PitcherStats {
                    outs: to_u32(outs),
                    strikeouts: to_u32(strikeouts),
                    hits: to_u32(hits),
                    earned_runs: to_u32(earned_runs),
                    walks: to_u32(walks),
                })
            }
            _ => None,
        };

        PitcherPrediction {
            id: row.id,
            user_id: row.user_id,
            game_id: row.game_id,
            pitcher_id: row.pitcher_id.max(0) as u64,
            predicted: PitcherStats {
                outs: to_u32(row.predicted_outs),
                strikeouts: to_u32(row.predicted_strikeouts),
                hits: to_u32(row.predicted_hits),
                earned_runs: to_u32(row.predicted_earned_runs),
                walks: to_u32(row.predicted_walks),
            },
            actual,
            points_earned: row.points_earned,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        }
    }
}

fn to_u32(v: i64) -> u32 {
    v.clamp(0, i64::from(u32::MAX)) as u32
}

fn parse_opt<T>(
    id: i64,
    column: &str,
    raw: Option<String>,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>> {
    match raw {
        None => Ok(None),
        Some(s) => parse(&s).map(Some).ok_or_else(|| corrupt(id, column, &s)),
    }
}

fn corrupt(id: i64, column: &str, value: &str) -> AppError {
    AppError::Database(sqlx::Error::Decode(
        format!("prediction {id}: unrecognized {column} '{value}'").into(),
    ))
}
