mod api;
mod classifier;
mod config;
mod db;
mod error;
mod feed;
mod resolver;
mod scorer;
mod state;
mod sync;
#[cfg(test)]
mod testutil;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::api::{HealthState, TickLatency};
use crate::config::Config;
use crate::db::{SqliteStore, Store};
use crate::error::Result;
use crate::feed::{FeedClient, HttpFeedClient};
use crate::state::{GameStateCache, ResolvedEventTracker};
use crate::sync::{SchedulerConfig, SyncDeps, SyncScheduler};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let store: Arc<dyn Store> = Arc::new(SqliteStore::connect(&cfg.db_path).await?);

    // --- Upstream feed ---
    let feed: Arc<dyn FeedClient> = Arc::new(HttpFeedClient::new(&cfg.feed_base_url, cfg.fetch_timeout)?);
    info!("Feed client ready for {}", cfg.feed_base_url);

    // --- Shared in-memory state ---
    let cache = GameStateCache::new(cfg.live_ttl, cfg.idle_ttl);
    let events = ResolvedEventTracker::new();
    let pitchers = ResolvedEventTracker::new();
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(TickLatency::new());

    // --- Scheduler ---
    let scheduler = Arc::new(SyncScheduler::new(
        SchedulerConfig::from(&cfg),
        SyncDeps {
            feed,
            store: Arc::clone(&store),
            cache: Arc::clone(&cache),
            events: Arc::clone(&events),
            pitchers: Arc::clone(&pitchers),
            health: Arc::clone(&health),
            latency: Arc::clone(&latency),
        },
    ));
    for game_id in &cfg.tracked_games {
        scheduler.track_game(game_id);
    }
    if cfg.tracked_games.is_empty() {
        warn!("TRACKED_GAMES not set; add games with POST /games/:id/track. Example: TRACKED_GAMES=745001,745002");
    }
    if cfg.auto_start {
        scheduler.start().await;
    } else {
        info!("AUTO_START disabled; scheduler idle until POST /sync/start");
    }

    // --- HTTP API server ---
    let api_state = ApiState {
        scheduler: Arc::clone(&scheduler),
        store,
        cache,
        events,
        pitchers,
        health,
        latency,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received; draining");
}
