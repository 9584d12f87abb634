use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Wall-clock nanoseconds since the Unix epoch; the timestamp unit of every stored row.
pub fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

// ---------------------------------------------------------------------------
// Game lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Scheduled,
    Live,
    Final,
    Postponed,
}

impl GameStatus {
    pub fn is_live(self) -> bool {
        self == GameStatus::Live
    }

    /// Final and postponed games will not produce new events.
    pub fn is_finished(self) -> bool {
        matches!(self, GameStatus::Final | GameStatus::Postponed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Scheduled => "scheduled",
            GameStatus::Live => "live",
            GameStatus::Final => "final",
            GameStatus::Postponed => "postponed",
        }
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Canonical classification of a completed at-bat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Single,
    Double,
    Triple,
    HomeRun,
    Walk,
    IntentionalWalk,
    HitByPitch,
    Strikeout,
    Groundout,
    Flyout,
    Lineout,
    Popout,
    DoublePlay,
    SacFly,
    SacBunt,
    FieldersChoice,
    FieldError,
    /// Nothing in the payload could be matched. Scores zero but still resolves.
    Unknown,
}

impl Outcome {
    pub const ALL: [Outcome; 18] = [
        Outcome::Single,
        Outcome::Double,
        Outcome::Triple,
        Outcome::HomeRun,
        Outcome::Walk,
        Outcome::IntentionalWalk,
        Outcome::HitByPitch,
        Outcome::Strikeout,
        Outcome::Groundout,
        Outcome::Flyout,
        Outcome::Lineout,
        Outcome::Popout,
        Outcome::DoublePlay,
        Outcome::SacFly,
        Outcome::SacBunt,
        Outcome::FieldersChoice,
        Outcome::FieldError,
        Outcome::Unknown,
    ];

    pub fn category(self) -> OutcomeCategory {
        match self {
            Outcome::Single | Outcome::Double | Outcome::Triple | Outcome::HomeRun => {
                OutcomeCategory::Hit
            }
            Outcome::Walk | Outcome::IntentionalWalk | Outcome::HitByPitch => OutcomeCategory::Walk,
            Outcome::Strikeout => OutcomeCategory::Strikeout,
            Outcome::Groundout
            | Outcome::Flyout
            | Outcome::Lineout
            | Outcome::Popout
            | Outcome::DoublePlay => OutcomeCategory::Out,
            Outcome::SacFly
            | Outcome::SacBunt
            | Outcome::FieldersChoice
            | Outcome::FieldError
            | Outcome::Unknown => OutcomeCategory::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Single => "single",
            Outcome::Double => "double",
            Outcome::Triple => "triple",
            Outcome::HomeRun => "home_run",
            Outcome::Walk => "walk",
            Outcome::IntentionalWalk => "intentional_walk",
            Outcome::HitByPitch => "hit_by_pitch",
            Outcome::Strikeout => "strikeout",
            Outcome::Groundout => "groundout",
            Outcome::Flyout => "flyout",
            Outcome::Lineout => "lineout",
            Outcome::Popout => "popout",
            Outcome::DoublePlay => "double_play",
            Outcome::SacFly => "sac_fly",
            Outcome::SacBunt => "sac_bunt",
            Outcome::FieldersChoice => "fielders_choice",
            Outcome::FieldError => "field_error",
            Outcome::Unknown => "unknown",
        }
    }

    /// Inverse of [`Outcome::as_str`], used when reading stored rows.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.as_str() == s)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse outcome buckets for category-mode predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    Hit,
    Walk,
    Strikeout,
    Out,
    Other,
}

impl OutcomeCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeCategory::Hit => "hit",
            OutcomeCategory::Walk => "walk",
            OutcomeCategory::Strikeout => "strikeout",
            OutcomeCategory::Out => "out",
            OutcomeCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            OutcomeCategory::Hit,
            OutcomeCategory::Walk,
            OutcomeCategory::Strikeout,
            OutcomeCategory::Out,
            OutcomeCategory::Other,
        ]
        .into_iter()
        .find(|c| c.as_str() == s)
    }
}

impl std::fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Snapshot model: produced once per fetch, never mutated afterwards
// ---------------------------------------------------------------------------

/// Presentation-only details carried along with an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub batter: Option<String>,
    pub pitcher: Option<String>,
    pub description: Option<String>,
    pub inning: Option<u32>,
    pub half_inning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Upstream-assigned, unique within a game, increasing.
    pub index: u32,
    pub is_complete: bool,
    pub outcome: Option<Outcome>,
    pub context: EventContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamSide {
    Home,
    Away,
}

/// The five predicted fields of a pitching line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitcherStats {
    /// Innings pitched expressed in outs (6.2 IP = 20 outs).
    pub outs: u32,
    pub strikeouts: u32,
    pub hits: u32,
    pub earned_runs: u32,
    pub walks: u32,
}

/// A starting pitcher's running line inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitcherLine {
    pub pitcher_id: u64,
    pub name: String,
    pub side: TeamSide,
    pub stats: PitcherStats,
    /// True once the pitcher's participation in the game is over.
    pub exited: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: String,
    pub status: GameStatus,
    /// Ordered by ascending `index`.
    pub events: Vec<EventRecord>,
    pub current_event: Option<u32>,
    pub starters: Vec<PitcherLine>,
}

impl GameSnapshot {
    pub fn event(&self, index: u32) -> Option<&EventRecord> {
        self.events.iter().find(|e| e.index == index)
    }

    pub fn completed_events(&self) -> impl Iterator<Item = &EventRecord> {
        self.events.iter().filter(|e| e.is_complete)
    }
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMode {
    /// Guess the exact outcome.
    Exact,
    /// Guess the outcome's coarse category.
    Category,
}

impl PredictionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionMode::Exact => "exact",
            PredictionMode::Category => "category",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(PredictionMode::Exact),
            "category" => Some(PredictionMode::Category),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: i64,
    pub user_id: String,
    pub game_id: String,
    pub event_index: u32,
    pub mode: PredictionMode,
    pub predicted_outcome: Option<Outcome>,
    pub predicted_category: Option<OutcomeCategory>,
    pub actual_outcome: Option<Outcome>,
    pub is_correct: Option<bool>,
    pub points_earned: i64,
    pub streak_count: u32,
    pub streak_bonus: i64,
    pub created_at: i64,
    /// None while pending. Set exactly once by the resolver.
    pub resolved_at: Option<i64>,
}

impl Prediction {
    pub fn is_pending(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Submission payload; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPrediction {
    pub user_id: String,
    pub game_id: String,
    pub event_index: u32,
    pub mode: PredictionMode,
    #[serde(default)]
    pub predicted_outcome: Option<Outcome>,
    #[serde(default)]
    pub predicted_category: Option<OutcomeCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitcherPrediction {
    pub id: i64,
    pub user_id: String,
    pub game_id: String,
    pub pitcher_id: u64,
    pub predicted: PitcherStats,
    pub actual: Option<PitcherStats>,
    pub points_earned: i64,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

impl PitcherPrediction {
    pub fn is_pending(&self) -> bool {
        self.resolved_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPitcherPrediction {
    pub user_id: String,
    pub game_id: String,
    pub pitcher_id: u64,
    pub predicted: PitcherStats,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtBatResolution {
    pub prediction_id: i64,
    pub actual_outcome: Outcome,
    pub is_correct: bool,
    pub points_earned: i64,
    pub streak_count: u32,
    pub streak_bonus: i64,
    pub resolved_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PitcherResolution {
    pub prediction_id: i64,
    pub actual: PitcherStats,
    pub points_earned: i64,
    pub resolved_at: i64,
}

/// One row update handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionRow {
    AtBat(AtBatResolution),
    Pitcher(PitcherResolution),
}

impl ResolutionRow {
    pub fn prediction_id(&self) -> i64 {
        match self {
            ResolutionRow::AtBat(r) => r.prediction_id,
            ResolutionRow::Pitcher(r) => r.prediction_id,
        }
    }
}

/// Result of a single per-row write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowWrite {
    Written,
    /// The row already had `resolved_at` set; treated as a no-op.
    AlreadyResolved,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionOutcome {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ResolutionOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

impl std::ops::AddAssign for ResolutionOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.attempted += rhs.attempted;
        self.succeeded += rhs.succeeded;
        self.failed += rhs.failed;
    }
}

// ---------------------------------------------------------------------------
// Sync log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncLogEntry {
    pub started_at_ns: i64,
    pub finished_at_ns: i64,
    pub games_polled: u32,
    pub fetch_failures: u32,
    pub candidates: u32,
    pub predictions_resolved: u32,
    pub predictions_failed: u32,
    pub note: Option<String>,
}
