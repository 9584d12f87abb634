use std::time::Duration;

use crate::error::{AppError, Result};

pub const FEED_BASE_URL: &str = "https://statsapi.mlb.com";

/// How many of a user's most recent resolved predictions are read to compute a streak.
/// Streak bonuses stop growing at 10, so anything above that is headroom.
pub const STREAK_LOOKBACK: u32 = 20;

/// Sync log notes longer than this many bytes are truncated.
pub const SYNC_NOTE_MAX_LEN: usize = 240;

#[derive(Debug, Clone)]
pub struct Config {
    pub feed_base_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Game ids polled from startup (TRACKED_GAMES, comma-separated).
    pub tracked_games: Vec<String>,
    /// Tick interval while any tracked game is live (POLL_INTERVAL_SECS)
    pub poll_interval: Duration,
    /// Tick interval when nothing tracked is live (IDLE_POLL_INTERVAL_SECS)
    pub idle_poll_interval: Duration,
    /// Cache TTL for live snapshots (LIVE_TTL_SECS)
    pub live_ttl: Duration,
    /// Cache TTL for scheduled/final/postponed snapshots (IDLE_TTL_SECS)
    pub idle_ttl: Duration,
    /// Upper bound on one upstream fetch (FETCH_TIMEOUT_SECS)
    pub fetch_timeout: Duration,
    /// Consecutive finished ticks before a game stops being polled (FINAL_TICKS_BEFORE_RELEASE)
    pub final_ticks_before_release: u32,
    /// Start the poll loop at process start (AUTO_START)
    pub auto_start: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            feed_base_url: var("FEED_BASE_URL").unwrap_or_else(|| FEED_BASE_URL.to_string()),
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            db_path: var("DB_PATH").unwrap_or_else(|| "predictions.db".to_string()),
            api_port: var("API_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            tracked_games: var("TRACKED_GAMES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            poll_interval: secs_var(&var, "POLL_INTERVAL_SECS", 10)?,
            idle_poll_interval: secs_var(&var, "IDLE_POLL_INTERVAL_SECS", 60)?,
            live_ttl: secs_var(&var, "LIVE_TTL_SECS", 10)?,
            idle_ttl: secs_var(&var, "IDLE_TTL_SECS", 300)?,
            fetch_timeout: secs_var(&var, "FETCH_TIMEOUT_SECS", 8)?,
            final_ticks_before_release: u32::try_from(positive_var(&var, "FINAL_TICKS_BEFORE_RELEASE", 3)?)
                .map_err(|_| AppError::Config("FINAL_TICKS_BEFORE_RELEASE is too large".to_string()))?,
            auto_start: var("AUTO_START")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
        })
    }
}

fn positive_var(var: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> Result<u64> {
    let value = match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| AppError::Config(format!("{name} must be a whole number")))?,
        None => default,
    };
    if value == 0 {
        return Err(AppError::Config(format!("{name} must be greater than zero")));
    }
    Ok(value)
}

fn secs_var(var: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> Result<Duration> {
    positive_var(var, name, default).map(Duration::from_secs)
}
