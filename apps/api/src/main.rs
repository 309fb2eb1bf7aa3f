mod catalog;
mod config;
mod engine;
mod errors;
mod models;
mod routes;
mod state;
mod sync;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::engine::SessionRegistry;
use crate::routes::build_router;
use crate::state::AppState;
use crate::sync::{HttpProgressStore, InMemoryProgressStore, ProgressStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed values)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rumbo API v{}", env!("CARGO_PKG_VERSION"));

    // Progress store: remote API when configured, in-memory otherwise
    let (store, store_kind): (Arc<dyn ProgressStore>, &'static str) = match &config.progress_api_url {
        Some(url) => {
            let store = HttpProgressStore::new(
                url,
                config.progress_api_token.clone(),
                config.http_timeout,
            )?;
            info!("Progress store: {url}");
            (Arc::new(store), "http")
        }
        None => {
            warn!("PROGRESS_API_URL is not set; progress is kept in memory and lost on restart");
            (Arc::new(InMemoryProgressStore::new()), "memory")
        }
    };

    let settings = config.session_settings();
    info!(
        "Sessions: save debounce {:?}, resync every {:?}, idle timeout {:?}, retreat scoring {}",
        settings.debounce, settings.resync_interval, settings.idle_timeout, settings.retreat_policy
    );
    let sessions = Arc::new(SessionRegistry::new(store, settings));
    sessions.start_idle_sweep();

    let state = AppState {
        sessions: sessions.clone(),
        store_kind,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Save whatever open sessions still hold before exiting
    sessions.close_all().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
