//! Liveness endpoint, served alongside the bot loop.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::info;

use crate::bot::BotStats;

type SharedStats = Arc<RwLock<BotStats>>;

/// `/` answers with a static string; `/status` returns a copy of the stats.
pub fn create_router(stats: SharedStats) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/status", get(status))
        .with_state(stats)
}

async fn home() -> &'static str {
    "Bot is running!"
}

async fn status(State(stats): State<SharedStats>) -> Json<BotStats> {
    let snapshot = stats.read().await.clone();
    Json(snapshot)
}

/// Serve until the process exits.
pub async fn serve(port: u16, stats: SharedStats) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health endpoint on {addr}"))?;

    info!(addr = %addr, "Health endpoint listening");

    axum::serve(listener, create_router(stats))
        .await
        .context("Health endpoint stopped")
}
