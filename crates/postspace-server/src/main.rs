//! # postspace-server
//!
//! HTTP API for postspace.
//!
//! This binary provides:
//! - **Post and reply endpoints** backed by a SQLite row store
//! - **Embedding on creation**: every root post is placed in 3D space by
//!   the external embedding service before it is stored
//! - **Profile endpoints** keyed by the identity provider's user id
//! - **Session verification** against the identity provider for writes
//! - **Per-IP rate limiting** to protect against abuse

mod api;
mod auth;
mod config;
mod embedding;
mod error;
mod rate_limit;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use postspace_store::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::auth::RemoteVerifier;
use crate::config::ServerConfig;
use crate::embedding::HttpEmbedder;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,postspace_server=debug,postspace_store=info")
            }),
        )
        .init();

    info!("Starting postspace server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            Database::open_at(path)?
        }
        None => Database::open_default()?,
    };
    info!(path = ?db.path(), "Database ready");

    let embedder = HttpEmbedder::new(&config.embedding_url, config.embedding_timeout)?;
    info!(endpoint = %embedder.endpoint(), "Embedding client ready");

    let verifier = RemoteVerifier::new(
        &config.auth_url,
        config.auth_api_key.clone(),
        config.embedding_timeout,
    )?;

    let rate_limiter = RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst);

    let http_addr = config.http_addr;
    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        embedder: Arc::new(embedder),
        verifier: Arc::new(verifier),
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let purged = rl.purge_stale(Duration::from_secs(600)).await;
            if purged > 0 {
                let tracked = rl.tracked_clients().await;
                tracing::debug!(purged, tracked, "Purged idle rate limit buckets");
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
