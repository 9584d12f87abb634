use crate::types::Outcome;

/// Result fields of a completed play, as read from the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultPayload {
    /// Primary result code, e.g. `strikeout` or `Home Run`.
    pub code: Option<String>,
    /// Free-text play description.
    pub description: Option<String>,
}

impl ResultPayload {
    pub fn new(code: Option<&str>, description: Option<&str>) -> Self {
        Self {
            code: code.map(str::to_string),
            description: description.map(str::to_string),
        }
    }
}

/// Primary codes after normalization (lowercase, spaces and hyphens as `_`).
/// `field_out` and `force_out` are deliberately absent: they don't say how the ball was put in
/// play, so the description decides.
const CODE_TABLE: &[(&str, Outcome)] = &[
    ("single", Outcome::Single),
    ("double", Outcome::Double),
    ("triple", Outcome::Triple),
    ("home_run", Outcome::HomeRun),
    ("walk", Outcome::Walk),
    ("intent_walk", Outcome::IntentionalWalk),
    ("intentional_walk", Outcome::IntentionalWalk),
    ("hit_by_pitch", Outcome::HitByPitch),
    ("strikeout", Outcome::Strikeout),
    ("strike_out", Outcome::Strikeout),
    ("strikeout_double_play", Outcome::Strikeout),
    ("groundout", Outcome::Groundout),
    ("ground_out", Outcome::Groundout),
    ("flyout", Outcome::Flyout),
    ("fly_out", Outcome::Flyout),
    ("lineout", Outcome::Lineout),
    ("line_out", Outcome::Lineout),
    ("pop_out", Outcome::Popout),
    ("popout", Outcome::Popout),
    ("double_play", Outcome::DoublePlay),
    ("grounded_into_double_play", Outcome::DoublePlay),
    ("grounded_into_dp", Outcome::DoublePlay),
    ("sac_fly", Outcome::SacFly),
    ("sac_bunt", Outcome::SacBunt),
    ("fielders_choice", Outcome::FieldersChoice),
    ("fielders_choice_out", Outcome::FieldersChoice),
    ("field_error", Outcome::FieldError),
];

/// Ordered description rules; first match wins. Longer phrases must precede their prefixes
/// ("double play" before "doubles", "intentionally walks" before "walks").
const DESCRIPTION_RULES: &[(&str, Outcome)] = &[
    ("homers", Outcome::HomeRun),
    ("home run", Outcome::HomeRun),
    ("grand slam", Outcome::HomeRun),
    ("triples", Outcome::Triple),
    ("ground-rule double", Outcome::Double),
    ("double play", Outcome::DoublePlay),
    ("doubles", Outcome::Double),
    ("singles", Outcome::Single),
    ("intentionally walks", Outcome::IntentionalWalk),
    ("walks", Outcome::Walk),
    ("hit by pitch", Outcome::HitByPitch),
    ("hit by a pitch", Outcome::HitByPitch),
    ("strikes out", Outcome::Strikeout),
    ("called out on strikes", Outcome::Strikeout),
    ("sacrifice fly", Outcome::SacFly),
    ("sac fly", Outcome::SacFly),
    ("sacrifice bunt", Outcome::SacBunt),
    ("fielder's choice", Outcome::FieldersChoice),
    ("fielders choice", Outcome::FieldersChoice),
    ("reaches on a", Outcome::FieldError),
    ("grounds out", Outcome::Groundout),
    ("force out", Outcome::Groundout),
    ("flies out", Outcome::Flyout),
    ("lines out", Outcome::Lineout),
    ("pops out", Outcome::Popout),
    // Last: an out that also mentions an error on a runner's advance is still the out.
    ("error", Outcome::FieldError),
];

/// Classify a completed play. Never fails: unmatched payloads are `Outcome::Unknown`.
pub fn classify(payload: &ResultPayload) -> Outcome {
    if let Some(outcome) = payload.code.as_deref().and_then(lookup_code) {
        return outcome;
    }
    payload
        .description
        .as_deref()
        .and_then(match_description)
        .unwrap_or(Outcome::Unknown)
}

fn lookup_code(code: &str) -> Option<Outcome> {
    let normalized = code.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    CODE_TABLE
        .iter()
        .find(|(c, _)| *c == normalized)
        .map(|&(_, outcome)| outcome)
}

fn match_description(description: &str) -> Option<Outcome> {
    let lowered = description.to_lowercase();
    DESCRIPTION_RULES
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|&(_, outcome)| outcome)
}
