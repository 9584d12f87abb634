//! Shared counters for the /health endpoint.
//! Updated by SyncScheduler at the end of each tick.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

/// Shared sync metrics. Written by the scheduler, read by the API.
#[derive(Default)]
pub struct HealthState {
    pub ticks_run: AtomicU64,
    /// Fires that found a tick already running.
    pub ticks_skipped: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub predictions_resolved: AtomicU64,
    /// Rows left pending by a failed write; each retries on a later tick.
    pub rows_failed: AtomicU64,
    /// Nanosecond timestamp of the last finished tick (0 = none).
    pub last_tick_at_ns: AtomicI64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub ticks_run: u64,
    pub ticks_skipped: u64,
    pub fetch_failures: u64,
    pub predictions_resolved: u64,
    pub rows_failed: u64,
    pub last_tick_at_ns: i64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self, finished_at_ns: i64, fetch_failures: u64, resolved: u64, failed: u64) {
        self.ticks_run.fetch_add(1, Ordering::Relaxed);
        self.fetch_failures.fetch_add(fetch_failures, Ordering::Relaxed);
        self.predictions_resolved.fetch_add(resolved, Ordering::Relaxed);
        self.rows_failed.fetch_add(failed, Ordering::Relaxed);
        self.last_tick_at_ns.store(finished_at_ns, Ordering::Relaxed);
    }

    pub fn inc_ticks_skipped(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            ticks_run: self.ticks_run.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            predictions_resolved: self.predictions_resolved.load(Ordering::Relaxed),
            rows_failed: self.rows_failed.load(Ordering::Relaxed),
            last_tick_at_ns: self.last_tick_at_ns.load(Ordering::Relaxed),
        }
    }
}
