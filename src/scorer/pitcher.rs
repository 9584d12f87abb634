use crate::types::PitcherStats;

/// Points available per field before distance penalties.
pub const FIELD_MAX: i64 = 20;
/// Added per field predicted exactly.
pub const EXACT_FIELD_BONUS: i64 = 5;
/// Added when all five fields are exact.
pub const PERFECT_LINE_BONUS: i64 = 25;

/// Penalty per unit of error. Outs move in small steps, runs and walks are scarce.
const OUTS_WEIGHT: i64 = 2;
const STRIKEOUTS_WEIGHT: i64 = 4;
const HITS_WEIGHT: i64 = 4;
const EARNED_RUNS_WEIGHT: i64 = 5;
const WALKS_WEIGHT: i64 = 5;

fn field_points(predicted: u32, actual: u32, weight: i64) -> i64 {
    let distance = (i64::from(predicted) - i64::from(actual)).abs();
    let partial = (FIELD_MAX - weight * distance).max(0);
    if distance == 0 {
        partial + EXACT_FIELD_BONUS
    } else {
        partial
    }
}

/// Distance-based partial credit over the five fields of a pitching line.
pub fn score_pitcher_line(predicted: &PitcherStats, actual: &PitcherStats) -> i64 {
    let fields = [
        (predicted.outs, actual.outs, OUTS_WEIGHT),
        (predicted.strikeouts, actual.strikeouts, STRIKEOUTS_WEIGHT),
        (predicted.hits, actual.hits, HITS_WEIGHT),
        (predicted.earned_runs, actual.earned_runs, EARNED_RUNS_WEIGHT),
        (predicted.walks, actual.walks, WALKS_WEIGHT),
    ];

    let total: i64 = fields.iter().map(|&(p, a, w)| field_points(p, a, w)).sum();
    if predicted == actual {
        total + PERFECT_LINE_BONUS
    } else {
        total
    }
}
