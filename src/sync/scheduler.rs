use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::TickLatency;
use crate::config::{Config, SYNC_NOTE_MAX_LEN};
use crate::db::Store;
use crate::feed::FeedClient;
use crate::resolver::{PitcherResolver, PredictionResolver};
use crate::state::{GameStateCache, ResolvedEventTracker};
use crate::sync::diff::{changed_outcomes, exited_starters, resolution_candidates};
use crate::types::{now_ns, GameSnapshot, ResolutionOutcome, SyncLogEntry};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub idle_poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub final_ticks_before_release: u32,
}

impl From<&Config> for SchedulerConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            poll_interval: cfg.poll_interval,
            idle_poll_interval: cfg.idle_poll_interval,
            fetch_timeout: cfg.fetch_timeout,
            final_ticks_before_release: cfg.final_ticks_before_release,
        }
    }
}

/// Everything the scheduler reads and writes, built once in `main`.
pub struct SyncDeps {
    pub feed: Arc<dyn FeedClient>,
    pub store: Arc<dyn Store>,
    pub cache: Arc<GameStateCache>,
    pub events: Arc<ResolvedEventTracker>,
    pub pitchers: Arc<ResolvedEventTracker<u64>>,
    pub health: Arc<HealthState>,
    pub latency: Arc<TickLatency>,
}

/// Result of one tick across every tracked game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub started_at_ns: i64,
    pub duration_ms: u64,
    pub games_polled: u32,
    pub fetch_failures: u32,
    pub candidates: u32,
    pub at_bats: ResolutionOutcome,
    pub pitcher_lines: ResolutionOutcome,
    /// Finished games dropped from tracking by this tick.
    pub released: Vec<String>,
}

#[derive(Default)]
struct GameTrack {
    previous: Option<Arc<GameSnapshot>>,
    live: bool,
    /// Consecutive ticks the game was seen final or postponed.
    finished_ticks: u32,
}

#[derive(Default)]
struct GameTick {
    fetch_failed: bool,
    candidates: u32,
    at_bats: ResolutionOutcome,
    pitcher_lines: ResolutionOutcome,
    released: bool,
    /// Work left for a later tick; blocks release.
    deferred: bool,
    notes: Vec<String>,
}

struct Polling {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Polls the feed for tracked games and resolves completed at-bats and pitcher lines.
///
/// Idle until `start()`; polling until `stop()`. Ticks never overlap: a fire that finds the
/// previous tick still running is skipped, not queued.
pub struct SyncScheduler {
    inner: Arc<Inner>,
    polling: Mutex<Option<Polling>>,
}

struct Inner {
    cfg: SchedulerConfig,
    feed: Arc<dyn FeedClient>,
    store: Arc<dyn Store>,
    cache: Arc<GameStateCache>,
    events: Arc<ResolvedEventTracker>,
    pitchers: Arc<ResolvedEventTracker<u64>>,
    at_bat_resolver: PredictionResolver,
    pitcher_resolver: PitcherResolver,
    health: Arc<HealthState>,
    latency: Arc<TickLatency>,
    games: DashMap<String, GameTrack>,
    busy: AtomicBool,
}

/// Clears the busy flag when a tick ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncScheduler {
    pub fn new(cfg: SchedulerConfig, deps: SyncDeps) -> Self {
        let at_bat_resolver = PredictionResolver::new(Arc::clone(&deps.store), Arc::clone(&deps.events));
        let pitcher_resolver = PitcherResolver::new(Arc::clone(&deps.store), Arc::clone(&deps.pitchers));
        Self {
            inner: Arc::new(Inner {
                cfg,
                feed: deps.feed,
                store: deps.store,
                cache: deps.cache,
                events: deps.events,
                pitchers: deps.pitchers,
                at_bat_resolver,
                pitcher_resolver,
                health: deps.health,
                latency: deps.latency,
                games: DashMap::new(),
                busy: AtomicBool::new(false),
            }),
            polling: Mutex::new(None),
        }
    }

    /// Idle → Polling. Returns false (and does nothing) when already polling.
    pub async fn start(&self) -> bool {
        let mut polling = self.polling.lock().await;
        if polling.as_ref().is_some_and(|p| !p.handle.is_finished()) {
            debug!("Scheduler already polling; start ignored");
            return false;
        }

        let (tx, rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run(rx).await });
        *polling = Some(Polling { handle, shutdown: tx });
        info!(games = self.inner.games.len(), "Sync scheduler started");
        true
    }

    /// Polling → Idle. An in-flight tick runs to completion in the background.
    pub async fn stop(&self) -> bool {
        let Some(polling) = self.polling.lock().await.take() else {
            return false;
        };
        let _ = polling.shutdown.send(true);
        info!("Sync scheduler stopped");
        true
    }

    /// Stop polling and wait for the in-flight tick to drain.
    pub async fn shutdown(&self) {
        let Some(polling) = self.polling.lock().await.take() else {
            return;
        };
        let _ = polling.shutdown.send(true);
        if let Err(e) = polling.handle.await {
            error!("Sync loop ended abnormally: {e}");
        }
        info!("Sync scheduler shut down");
    }

    /// Run one tick now. `None` when a tick is already running.
    pub async fn trigger_once(&self) -> Option<TickReport> {
        self.inner.fire().await
    }

    /// Returns false when the game was already tracked.
    pub fn track_game(&self, game_id: &str) -> bool {
        if self.inner.games.contains_key(game_id) {
            return false;
        }
        self.inner.games.insert(game_id.to_string(), GameTrack::default());
        info!(game_id, "Tracking game {game_id}");
        true
    }

    pub fn untrack_game(&self, game_id: &str) -> bool {
        let removed = self.inner.games.remove(game_id).is_some();
        if removed {
            self.inner.events.forget(game_id);
            self.inner.pitchers.forget(game_id);
            info!(game_id, "Stopped tracking game {game_id}");
        }
        removed
    }

    pub fn tracked_games(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.games.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub async fn is_polling(&self) -> bool {
        self.polling
            .lock()
            .await
            .as_ref()
            .is_some_and(|p| !p.handle.is_finished())
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }
}

impl Inner {
    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            self.fire().await;
            let wait = self.current_interval();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => break,
            }
        }
        debug!("Sync loop exited");
    }

    /// Fast interval while any tracked game is live, idle interval otherwise.
    fn current_interval(&self) -> Duration {
        if self.games.iter().any(|g| g.live) {
            self.cfg.poll_interval
        } else {
            self.cfg.idle_poll_interval
        }
    }

    async fn fire(&self) -> Option<TickReport> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.health.inc_ticks_skipped();
            debug!("Previous tick still running; skipping");
            return None;
        }
        let _guard = BusyGuard(&self.busy);
        Some(self.tick().await)
    }

    async fn tick(&self) -> TickReport {
        let started = Instant::now();
        let started_at_ns = now_ns();

        let game_ids: Vec<String> = self.games.iter().map(|e| e.key().clone()).collect();
        let results = join_all(game_ids.iter().map(|id| self.sync_game(id))).await;

        let mut report = TickReport {
            started_at_ns,
            games_polled: game_ids.len() as u32,
            ..TickReport::default()
        };
        let mut notes = Vec::new();
        for (game_id, result) in game_ids.into_iter().zip(results) {
            report.fetch_failures += u32::from(result.fetch_failed);
            report.candidates += result.candidates;
            report.at_bats += result.at_bats;
            report.pitcher_lines += result.pitcher_lines;
            notes.extend(result.notes);
            if result.released {
                report.released.push(game_id);
            }
        }

        let purged = self.cache.purge_expired();
        if purged > 0 {
            debug!(purged, "Purged expired snapshots");
        }

        let elapsed = started.elapsed();
        report.duration_ms = elapsed.as_millis() as u64;
        self.latency.record(elapsed);

        let finished_at_ns = now_ns();
        let resolved = report.at_bats.succeeded + report.pitcher_lines.succeeded;
        let failed = report.at_bats.failed + report.pitcher_lines.failed;
        self.health.record_tick(
            finished_at_ns,
            u64::from(report.fetch_failures),
            resolved as u64,
            failed as u64,
        );

        let entry = SyncLogEntry {
            started_at_ns,
            finished_at_ns,
            games_polled: report.games_polled,
            fetch_failures: report.fetch_failures,
            candidates: report.candidates,
            predictions_resolved: resolved as u32,
            predictions_failed: failed as u32,
            note: truncate_note(notes.join("; ")),
        };
        if let Err(e) = self.store.append_sync_log(&entry).await {
            warn!("Sync log append failed: {e}");
        }

        info!(
            games = report.games_polled,
            fetch_failures = report.fetch_failures,
            candidates = report.candidates,
            resolved,
            failed,
            duration_ms = report.duration_ms,
            "TICK | games: {} | candidates: {} | resolved: {} | failed: {} | {}ms",
            report.games_polled,
            report.candidates,
            resolved,
            failed,
            report.duration_ms,
        );
        report
    }

    async fn sync_game(&self, game_id: &str) -> GameTick {
        let mut out = GameTick::default();

        let fetched = match tokio::time::timeout(self.cfg.fetch_timeout, self.feed.fetch_snapshot(game_id)).await {
            Ok(Ok(fetched)) => fetched,
            Ok(Err(e)) => {
                warn!(game_id, "Feed fetch failed, retrying next tick: {e}");
                out.fetch_failed = true;
                out.notes.push(format!("{game_id}: fetch failed"));
                return out;
            }
            Err(_) => {
                warn!(game_id, timeout_ms = self.cfg.fetch_timeout.as_millis() as u64, "Feed fetch timed out");
                out.fetch_failed = true;
                out.notes.push(format!("{game_id}: fetch timed out"));
                return out;
            }
        };

        let Some(snapshot) = fetched else {
            debug!(game_id, "Feed has no game {game_id}");
            out.released = self.note_finished(game_id, None, true);
            return out;
        };

        let previous = self.games.get(game_id).and_then(|t| t.previous.clone());
        let snapshot = self.cache.put(game_id, snapshot);
        if let Err(e) = self.store.upsert_snapshot(&snapshot).await {
            warn!(game_id, "Snapshot mirror write failed: {e}");
        }

        self.seed_trackers(game_id).await;

        if let Some(prev) = previous.as_deref() {
            for (index, before, after) in changed_outcomes(prev, &snapshot) {
                warn!(game_id, event_index = index, "Completed at-bat {index} changed outcome {before} -> {after}; keeping first resolution");
            }
        }

        let candidates = resolution_candidates(previous.as_deref(), &snapshot, |i| {
            self.events.is_resolved(game_id, i)
        });
        out.candidates = candidates.len() as u32;

        // Sequential and ascending so each streak reads the history before it.
        for candidate in candidates {
            match self
                .at_bat_resolver
                .resolve(game_id, candidate.index, candidate.outcome)
                .await
            {
                Ok(result) => {
                    out.at_bats += result;
                    if !result.is_complete() {
                        out.notes.push(format!("{game_id}#{}: {} rows pending", candidate.index, result.failed));
                        out.deferred = true;
                        break;
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(game_id, event_index = candidate.index, "Resolution deferred: {e}");
                    out.notes.push(format!("{game_id}#{}: {e}", candidate.index));
                    out.deferred = true;
                    break;
                }
                // Retrying cannot help; later at-bats go ahead.
                Err(e) => {
                    error!(game_id, event_index = candidate.index, "At-bat {} cannot be resolved: {e}", candidate.index);
                    out.notes.push(format!("{game_id}#{}: {e}", candidate.index));
                }
            }
        }

        for line in exited_starters(&snapshot, |id| self.pitchers.is_resolved(game_id, id)) {
            match self.pitcher_resolver.resolve(game_id, line).await {
                Ok(result) => out.pitcher_lines += result,
                Err(e) => {
                    warn!(game_id, pitcher_id = line.pitcher_id, "Pitcher resolution failed: {e}");
                    out.notes.push(format!("{game_id}/p{}: {e}", line.pitcher_id));
                    out.deferred |= e.is_transient();
                }
            }
        }

        let settled = out.at_bats.is_complete() && out.pitcher_lines.is_complete() && !out.deferred;
        out.released = self.note_finished(game_id, Some(snapshot), settled);
        out
    }

    /// Seed both trackers from the store the first time a game is seen in this process.
    async fn seed_trackers(&self, game_id: &str) {
        if !self.events.is_initialized(game_id) {
            match self.store.resolved_event_indices(game_id).await {
                Ok(indices) => {
                    debug!(game_id, resolved = indices.len(), "Seeded resolved at-bats");
                    self.events.initialize(game_id, indices);
                }
                Err(e) => warn!(game_id, "Could not seed resolved at-bats: {e}"),
            }
        }
        if !self.pitchers.is_initialized(game_id) {
            match self.store.resolved_pitcher_ids(game_id).await {
                Ok(ids) => self.pitchers.initialize(game_id, ids),
                Err(e) => warn!(game_id, "Could not seed resolved pitcher lines: {e}"),
            }
        }
    }

    /// Record this tick's view of the game. Returns true when the game was released.
    ///
    /// `None` means the feed has no such game, which counts toward release like a final status.
    /// A game is only released on a tick that left nothing pending.
    fn note_finished(&self, game_id: &str, snapshot: Option<Arc<GameSnapshot>>, settled: bool) -> bool {
        let finished = snapshot.as_ref().map_or(true, |s| s.status.is_finished());
        let release = {
            let Some(mut track) = self.games.get_mut(game_id) else {
                // Untracked while the tick was running.
                return false;
            };
            track.live = snapshot.as_ref().is_some_and(|s| s.status.is_live());
            track.finished_ticks = if finished { track.finished_ticks + 1 } else { 0 };
            if snapshot.is_some() {
                track.previous = snapshot;
            }
            finished && settled && track.finished_ticks >= self.cfg.final_ticks_before_release
        };

        if release {
            self.games.remove(game_id);
            self.events.forget(game_id);
            self.pitchers.forget(game_id);
            info!(game_id, "Game {game_id} finished; released from tracking");
        }
        release
    }
}

fn truncate_note(note: String) -> Option<String> {
    if note.is_empty() {
        return None;
    }
    if note.len() <= SYNC_NOTE_MAX_LEN {
        return Some(note);
    }
    let mut end = SYNC_NOTE_MAX_LEN;
    while !note.is_char_boundary(end) {
        end -= 1;
    }
    Some(note[..end].to_string())
}
