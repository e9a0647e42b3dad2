// ABOUTME: Minimal HTTP surface: a liveness string and a JSON snapshot of the session.
// ABOUTME: Read-only; the dispatch loop is never triggered over HTTP.

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use sender_core::SessionStatus;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

pub const LIVENESS_MESSAGE: &str = "Safe Sender is running";

#[derive(Clone)]
struct ServerState {
    status: watch::Receiver<SessionStatus>,
}

pub fn router(status: watch::Receiver<SessionStatus>) -> Router {
    Router::new()
        .route("/", get(|| async { LIVENESS_MESSAGE }))
        .route("/status", get(status_handler))
        .with_state(ServerState { status })
        .layer(TraceLayer::new_for_http())
}

async fn status_handler(State(state): State<ServerState>) -> Json<SessionStatus> {
    Json(state.status.borrow().clone())
}

/// Bind and serve until the process exits
pub async fn start_server(host: &str, port: u16, status: watch::Receiver<SessionStatus>) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Server running at http://{}", addr);

    axum::serve(listener, router(status))
        .await
        .context("HTTP server failed")?;
    Ok(())
}
