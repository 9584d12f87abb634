//! Snapshot-to-snapshot diffing. Pure functions over the typed model.

use crate::types::{GameSnapshot, Outcome, PitcherLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub index: u32,
    pub outcome: Outcome,
}

/// Completed at-bats to hand to the resolver, lowest index first.
///
/// An at-bat qualifies when it completed since `previous`, or when it is complete but not yet
/// marked in the tracker. Without a previous snapshot (first sight of the game in this process)
/// only the tracker decides, so a restart doesn't re-read every finished at-bat.
pub fn resolution_candidates(
    previous: Option<&GameSnapshot>,
    current: &GameSnapshot,
    is_resolved: impl Fn(u32) -> bool,
) -> Vec<Candidate> {
    let newly_complete = |index: u32| {
        previous.is_some_and(|prev| !prev.event(index).is_some_and(|e| e.is_complete))
    };

    let mut candidates: Vec<Candidate> = current
        .completed_events()
        .filter(|e| newly_complete(e.index) || !is_resolved(e.index))
        .map(|e| Candidate {
            index: e.index,
            outcome: e.outcome.unwrap_or(Outcome::Unknown),
        })
        .collect();
    candidates.sort_by_key(|c| c.index);
    candidates
}

/// Complete at-bats whose classified outcome differs between two polls. Finished at-bats are
/// immutable upstream, so anything returned here is a feed anomaly worth logging.
pub fn changed_outcomes(previous: &GameSnapshot, current: &GameSnapshot) -> Vec<(u32, Outcome, Outcome)> {
    current
        .completed_events()
        .filter_map(|e| {
            let before = previous.event(e.index).filter(|p| p.is_complete)?.outcome?;
            let after = e.outcome?;
            (before != after).then_some((e.index, before, after))
        })
        .collect()
}

/// Starters whose outing has ended and whose line hasn't been resolved.
pub fn exited_starters<'a>(
    current: &'a GameSnapshot,
    is_resolved: impl Fn(u64) -> bool + 'a,
) -> impl Iterator<Item = &'a PitcherLine> + 'a {
    current
        .starters
        .iter()
        .filter(move |line| line.exited && !is_resolved(line.pitcher_id))
}
