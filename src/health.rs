//! Liveness endpoint for uptime probes.

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tracing::info;

/// Always answers 200 "OK"
pub async fn livez() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Router serving `GET /` and `GET /livez`
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/", get(livez))
        .route("/livez", get(livez))
}

/// Binds `addr` and serves the health router until the task is dropped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health endpoint on {addr}"))?;
    info!(addr = %addr, "Health endpoint listening");
    axum::serve(listener, router())
        .await
        .context("Health endpoint failed")
}
