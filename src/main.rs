//! Availability gateway: Cronofy fan-out with partial-cache merging.
//!
//! Single-binary Tokio application that:
//! 1. Validates availability requests on POST /availability
//! 2. Splits member rosters into provider-sized batches
//! 3. Queries the Cronofy availability API concurrently
//! 4. Caches aggregated slots per time-horizon bucket, topping up
//!    partially covered buckets instead of refetching everyone

mod config;
mod http;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use aggregator::{Aggregator, AvailabilityCache};
use cronofy_client::{CronofyClient, RateLimiter};

/// Cronofy availability aggregation gateway
#[derive(Parser)]
#[command(name = "availability-gateway", about = "Cronofy availability aggregation gateway")]
struct Cli {
    /// Load and validate the configuration, then exit.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "availability_gateway=info,cronofy_client=info,aggregator=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("📅 Availability Gateway starting up...");

    // Load configuration.
    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("Cronofy endpoint: {}", cfg.base_url);
    info!(
        "Provider: batch_size={} timeout={}s rate={}rps",
        cfg.provider.batch_size, cfg.provider.timeout_secs, cfg.provider.requests_per_second
    );
    info!(
        "Cache: ttl={}s sweep_interval={}s",
        cfg.cache.ttl_secs, cfg.cache.sweep_interval_secs
    );

    if cli.check_config {
        info!("✅ Configuration OK");
        return;
    }

    // Initialize the provider client.
    let limiter = RateLimiter::per_second(cfg.provider.requests_per_second);
    let client = match CronofyClient::new(
        &cfg.access_token,
        &cfg.base_url,
        Duration::from_secs(cfg.provider.timeout_secs),
        limiter,
    ) {
        Ok(c) => c,
        Err(e) => {
            error!("Client initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    // ── Shared state ─────────────────────────────────────────────────
    let cache = Arc::new(AvailabilityCache::new(Duration::from_secs(cfg.cache.ttl_secs)));
    let engine = Aggregator::new(Arc::new(client), cache.clone(), cfg.provider.batch_size);
    let state = Arc::new(http::AppState { engine });

    // ── Cache sweep task ─────────────────────────────────────────────
    // Expiry is lazy on read; the sweep keeps abandoned buckets from
    // lingering between requests.
    let sweep_cache = cache.clone();
    let sweep_interval = Duration::from_secs(cfg.cache.sweep_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            sweep_cache.evict_expired();
        }
    });

    // ── Serve ────────────────────────────────────────────────────────
    let app = http::router(state);
    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("🚀 Availability Gateway listening on http://{}. Press Ctrl+C to stop.", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Availability Gateway shut down.");
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
