//! At-bat scoring: base points by outcome rarity plus a streak bonus.

use crate::types::{Outcome, OutcomeCategory, Prediction, PredictionMode};

/// Exact-mode points. Harder calls pay more.
pub fn base_points(outcome: Outcome) -> i64 {
    match outcome {
        Outcome::HomeRun => 20,
        Outcome::Triple => 15,
        Outcome::Double => 10,
        Outcome::Single => 6,
        Outcome::FieldError => 6,
        Outcome::DoublePlay | Outcome::SacFly | Outcome::SacBunt | Outcome::FieldersChoice => 5,
        Outcome::Walk | Outcome::IntentionalWalk | Outcome::HitByPitch => 4,
        Outcome::Strikeout
        | Outcome::Groundout
        | Outcome::Flyout
        | Outcome::Lineout
        | Outcome::Popout => 3,
        Outcome::Unknown => 0,
    }
}

/// Category-mode points. A coarse guess is easier, so it pays less.
pub fn category_points(category: OutcomeCategory) -> i64 {
    match category {
        OutcomeCategory::Hit => 4,
        OutcomeCategory::Other => 3,
        OutcomeCategory::Walk => 3,
        OutcomeCategory::Strikeout => 2,
        OutcomeCategory::Out => 1,
    }
}

/// (minimum streak, bonus), highest threshold first.
pub const STREAK_STEPS: &[(u32, i64)] = &[(10, 10), (7, 7), (5, 5), (3, 3), (2, 1)];

pub fn streak_bonus(streak: u32) -> i64 {
    STREAK_STEPS
        .iter()
        .find(|&&(min, _)| streak >= min)
        .map(|&(_, bonus)| bonus)
        .unwrap_or(0)
}

/// Consecutive correct predictions at the head of `recent` (newest first).
pub fn current_streak(recent: &[Prediction]) -> u32 {
    recent
        .iter()
        .take_while(|p| p.is_correct == Some(true))
        .count() as u32
}

pub fn is_correct(prediction: &Prediction, actual: Outcome) -> bool {
    if actual == Outcome::Unknown {
        return false;
    }
    match prediction.mode {
        PredictionMode::Exact => prediction.predicted_outcome == Some(actual),
        PredictionMode::Category => prediction.predicted_category == Some(actual.category()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtBatScore {
    pub is_correct: bool,
    pub base_points: i64,
    /// Streak length including this prediction; 0 when it breaks the chain.
    pub streak_count: u32,
    pub streak_bonus: i64,
    pub points_earned: i64,
}

/// Score one prediction against the actual outcome and the user's resolved history.
pub fn score_at_bat(prediction: &Prediction, actual: Outcome, recent: &[Prediction]) -> AtBatScore {
    let correct = is_correct(prediction, actual);
    if !correct {
        return AtBatScore {
            is_correct: false,
            base_points: 0,
            streak_count: 0,
            streak_bonus: 0,
            points_earned: 0,
        };
    }

    let base = match prediction.mode {
        PredictionMode::Exact => base_points(actual),
        PredictionMode::Category => category_points(actual.category()),
    };
    let streak_count = current_streak(recent) + 1;
    let bonus = streak_bonus(streak_count);

    AtBatScore {
        is_correct: true,
        base_points: base,
        streak_count,
        streak_bonus: bonus,
        points_earned: base + bonus,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(mode: PredictionMode, outcome: Option<Outcome>, category: Option<OutcomeCategory>) -> Prediction {
        Prediction {
            id: 1,
            user_id: "u1".to_string(),
            game_id: "g1".to_string(),
            event_index: 0,
            mode,
            predicted_outcome: outcome,
            predicted_category: category,
            actual_outcome: None,
            is_correct: None,
            points_earned: 0,
            streak_count: 0,
            streak_bonus: 0,
            created_at: 0,
            resolved_at: None,
        }
    }

    fn resolved(correct: bool) -> Prediction {
        Prediction {
            is_correct: Some(correct),
            resolved_at: Some(1),
            ..prediction(PredictionMode::Exact, Some(Outcome::Single), None)
        }
    }

    #[test]
    fn rarer_outcomes_pay_more() {
        assert!(base_points(Outcome::HomeRun) > base_points(Outcome::Triple));
        assert!(base_points(Outcome::Triple) > base_points(Outcome::Double));
        assert!(base_points(Outcome::Double) > base_points(Outcome::Single));
        assert!(base_points(Outcome::Single) > base_points(Outcome::Walk));
        assert!(base_points(Outcome::Walk) >= base_points(Outcome::Strikeout));
        assert!(base_points(Outcome::Strikeout) >= base_points(Outcome::Groundout));
        assert_eq!(base_points(Outcome::Unknown), 0);
    }

    #[test]
    fn streak_table_steps() {
        let expected = [(0, 0), (1, 0), (2, 1), (3, 3), (4, 3), (5, 5), (6, 5), (7, 7), (9, 7), (10, 10), (25, 10)];
        for (streak, bonus) in expected {
            assert_eq!(streak_bonus(streak), bonus, "streak {streak}");
        }
    }

    #[test]
    fn streak_bonus_is_non_decreasing() {
        let mut last = 0;
        for streak in 0..30 {
            let bonus = streak_bonus(streak);
            assert!(bonus >= last);
            last = bonus;
        }
    }

    #[test]
    fn incorrect_prediction_breaks_the_chain() {
        // Chronological: correct, correct, incorrect. Newest first for the lookup.
        let history = vec![resolved(false), resolved(true), resolved(true)];
        assert_eq!(current_streak(&history), 0);

        let p = prediction(PredictionMode::Exact, Some(Outcome::Strikeout), None);
        let score = score_at_bat(&p, Outcome::Strikeout, &history);
        assert_eq!(score.streak_count, 1, "the incorrect pick reset the streak");
        assert_eq!(score.streak_bonus, 0);
        assert_eq!(score.points_earned, base_points(Outcome::Strikeout));
    }

    #[test]
    fn correct_run_extends_streak() {
        let history = vec![resolved(true), resolved(true), resolved(false), resolved(true)];
        let p = prediction(PredictionMode::Exact, Some(Outcome::HomeRun), None);
        let score = score_at_bat(&p, Outcome::HomeRun, &history);
        assert_eq!(score.streak_count, 3);
        assert_eq!(score.points_earned, 20 + 3);
    }

    #[test]
    fn category_mode_matches_bucket() {
        let p = prediction(PredictionMode::Category, None, Some(OutcomeCategory::Hit));
        let score = score_at_bat(&p, Outcome::Double, &[]);
        assert!(score.is_correct);
        assert_eq!(score.points_earned, category_points(OutcomeCategory::Hit));

        let miss = score_at_bat(&p, Outcome::Walk, &[]);
        assert!(!miss.is_correct);
        assert_eq!(miss.points_earned, 0);
    }

    #[test]
    fn unknown_outcome_is_wrong_for_everyone() {
        let exact = prediction(PredictionMode::Exact, Some(Outcome::Unknown), None);
        let category = prediction(PredictionMode::Category, None, Some(OutcomeCategory::Other));
        assert!(!is_correct(&exact, Outcome::Unknown));
        assert!(!is_correct(&category, Outcome::Unknown));
    }
}
