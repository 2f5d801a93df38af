use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use notification_queue::NotificationQueue;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Health check endpoint
///
/// Always 200 while the process serves requests; the queue figures let
/// operators spot a worker that has stopped draining.
async fn health(State(queue): State<Arc<NotificationQueue>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "notification-worker",
            "pendingJobs": queue.len(),
            "enqueuedTotal": queue.enqueued_total(),
        })),
    )
}

/// Router serving `/health`
pub fn router(queue: Arc<NotificationQueue>) -> Router {
    Router::new().route("/health", get(health)).with_state(queue)
}

/// Start the health check HTTP server
///
/// # Errors
///
/// Returns an error if the server fails to bind to the specified port
pub async fn start_health_server(
    queue: Arc<NotificationQueue>,
    port: u16,
    shutdown_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Health check server listening on {}", addr);

    axum::serve(listener, router(queue))
        .with_graceful_shutdown(async move {
            shutdown_token.cancelled().await;
        })
        .await?;

    Ok(())
}
