//! The only place raw feed JSON is read. Everything downstream sees `GameSnapshot`.
//!
//! The upstream is eventually consistent: fields come and go between polls. A play without an
//! index is dropped; a missing optional field becomes `None`. Only a missing game status is
//! treated as a bad payload.

use serde_json::Value;

use crate::classifier::{classify, ResultPayload};
use crate::error::{AppError, Result};
use crate::types::{
    EventContext, EventRecord, GameSnapshot, GameStatus, PitcherLine, PitcherStats, TeamSide,
};

pub fn parse_live_feed(game_id: &str, v: &Value) -> Result<GameSnapshot> {
    let status = parse_status(v.pointer("/gameData/status"))
        .ok_or_else(|| AppError::FeedParse(format!("game {game_id}: missing or unrecognized status")))?;

    let mut events: Vec<EventRecord> = v
        .pointer("/liveData/plays/allPlays")
        .and_then(Value::as_array)
        .map(|plays| plays.iter().filter_map(parse_play).collect())
        .unwrap_or_default();
    events.sort_by_key(|e| e.index);
    events.dedup_by_key(|e| e.index);

    let current_event = v
        .pointer("/liveData/plays/currentPlay/about/atBatIndex")
        .and_then(as_u32);

    let mut starters = Vec::new();
    if let Some(teams) = v.pointer("/liveData/boxscore/teams") {
        for (key, side) in [("away", TeamSide::Away), ("home", TeamSide::Home)] {
            if let Some(line) = teams.get(key).and_then(|t| parse_starter(t, side, status)) {
                starters.push(line);
            }
        }
    }

    Ok(GameSnapshot {
        game_id: game_id.to_string(),
        status,
        events,
        current_event,
        starters,
    })
}

fn parse_status(status: Option<&Value>) -> Option<GameStatus> {
    let status = status?;
    let detailed = status.get("detailedState").and_then(Value::as_str).unwrap_or("");
    if ["Postponed", "Suspended", "Cancelled"]
        .iter()
        .any(|s| detailed.contains(s))
    {
        return Some(GameStatus::Postponed);
    }
    match status.get("abstractGameState")?.as_str()? {
        "Preview" => Some(GameStatus::Scheduled),
        "Live" => Some(GameStatus::Live),
        "Final" => Some(GameStatus::Final),
        _ => None,
    }
}

fn parse_play(play: &Value) -> Option<EventRecord> {
    let about = play.get("about")?;
    let index = about.get("atBatIndex").and_then(as_u32)?;
    let is_complete = about.get("isComplete").and_then(Value::as_bool).unwrap_or(false);

    let result = play.get("result");
    let text = |key: &str| result.and_then(|r| r.get(key)).and_then(Value::as_str);
    let description = text("description").filter(|d| !d.is_empty());

    let outcome = is_complete.then(|| {
        // `event` is the finer-grained label ("Groundout"); `eventType` is the fallback.
        let code = text("event").or_else(|| text("eventType"));
        classify(&ResultPayload::new(code, description))
    });

    let name = |role: &str| {
        play.get("matchup")
            .and_then(|m| m.get(role))
            .and_then(|p| p.get("fullName"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Some(EventRecord {
        index,
        is_complete,
        outcome,
        context: EventContext {
            batter: name("batter"),
            pitcher: name("pitcher"),
            description: description.map(str::to_string),
            inning: about.get("inning").and_then(as_u32),
            half_inning: about.get("halfInning").and_then(Value::as_str).map(str::to_string),
        },
    })
}

/// First pitcher used by a team. Their outing is over once a reliever appears or the game ends.
fn parse_starter(team: &Value, side: TeamSide, status: GameStatus) -> Option<PitcherLine> {
    let pitchers = team.get("pitchers")?.as_array()?;
    let pitcher_id = pitchers.first()?.as_u64()?;
    let player = team.get("players")?.get(format!("ID{pitcher_id}"))?;

    let name = player
        .pointer("/person/fullName")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let pitching = player.pointer("/stats/pitching");
    let stat = |key: &str| {
        pitching
            .and_then(|p| p.get(key))
            .and_then(as_u32)
            .unwrap_or(0)
    };
    let outs = pitching
        .and_then(|p| p.get("outs"))
        .and_then(as_u32)
        .or_else(|| {
            pitching
                .and_then(|p| p.get("inningsPitched"))
                .and_then(Value::as_str)
                .and_then(innings_to_outs)
        })
        .unwrap_or(0);

    Some(PitcherLine {
        pitcher_id,
        name,
        side,
        stats: PitcherStats {
            outs,
            strikeouts: stat("strikeOuts"),
            hits: stat("hits"),
            earned_runs: stat("earnedRuns"),
            walks: stat("baseOnBalls"),
        },
        exited: pitchers.len() > 1 || status.is_finished(),
    })
}

/// "6.2" innings → 20 outs. The fractional digit counts outs, not tenths.
pub fn innings_to_outs(ip: &str) -> Option<u32> {
    let (whole, frac) = match ip.trim().split_once('.') {
        Some((w, f)) => (w, f),
        None => (ip.trim(), "0"),
    };
    let whole: u32 = whole.parse().ok()?;
    let frac: u32 = frac.parse().ok()?;
    if frac > 2 {
        return None;
    }
    Some(whole * 3 + frac)
}

fn as_u32(v: &Value) -> Option<u32> {
    v.as_u64().and_then(|n| u32::try_from(n).ok())
}
