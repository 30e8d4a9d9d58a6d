use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deckbreaker::config::Config;
use deckbreaker::state::AppState;
use deckbreaker::stats::InMemoryStats;
use deckbreaker::transport::MemoryTransport;

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deckbreaker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting deckbreaker engine...");

    let config = Config::from_env();

    // The real chat transport is wired in by the embedding bot; running
    // the binary standalone uses the in-memory transport for dry runs.
    let transport = Arc::new(MemoryTransport::new());
    let stats = Arc::new(InMemoryStats::new());
    let state = Arc::new(AppState::new(config, transport, stats));

    state.spawn_scheduler();

    if let Ok(path) = std::env::var("DECK_META_PATH") {
        match state.load_deck_from_path(std::path::Path::new(&path)).await {
            Ok(name) => tracing::info!("Deck {:?} ready", name),
            Err(e) => tracing::error!("Failed to load deck from {}: {}", path, e),
        }
    } else {
        tracing::warn!("DECK_META_PATH not set; no deck loaded");
    }

    tracing::info!("Engine initialized; waiting for shutdown signal");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
