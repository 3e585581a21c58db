//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use knotify_core::error::{KnotifyError, Result};
use knotify_engine::Engine;

use crate::routes;

/// Shared state for the gateway server.
pub struct AppState {
    pub engine: Arc<Engine>,
    pub start_time: std::time::Instant,
}

/// Build the router. Split out so tests can drive it without a socket.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health_check))
        .route(
            "/messages/process-scheduled",
            get(routes::process_scheduled_usage).post(routes::process_scheduled),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn start(state: Arc<AppState>, host: &str, port: u16) -> Result<()> {
    let app = router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| KnotifyError::Gateway(format!("Bind {addr}: {e}")))?;
    tracing::info!("🌐 Gateway listening on http://{addr}");
    axum::serve(listener, app)
        .await
        .map_err(|e| KnotifyError::Gateway(format!("Serve: {e}")))?;
    Ok(())
}
