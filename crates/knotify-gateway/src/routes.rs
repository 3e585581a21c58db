//! API route handlers for the gateway.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use crate::server::AppState;

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "knotify-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Trigger one processing pass over due messages.
///
/// Always 200 with aggregate counts when the pass ran — per-item send
/// failures live in the `failed` count and in delivery records, not in
/// the status code. Only a top-level datastore failure is a 500.
pub async fn process_scheduled(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.engine.process_due_messages().await {
        Ok(summary) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "processed": summary.processed,
                "sent": summary.sent,
                "failed": summary.failed,
            })),
        ),
        Err(e) => {
            tracing::error!("Scheduled-message pass failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"ok": false, "error": "internal error"})),
            )
        }
    }
}

/// Usage guidance for the trigger endpoint; read-only, returns no state.
pub async fn process_scheduled_usage() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "endpoint": "/messages/process-scheduled",
        "method": "POST",
        "description": "Processes due scheduled messages (status=scheduled, send_at <= now) in one bounded batch.",
        "response": {"processed": 0, "sent": 0, "failed": 0},
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::router;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use knotify_core::KnotifyConfig;
    use knotify_core::types::{Guest, MessageStatus, MessageTarget, ScheduledMessage};
    use knotify_engine::Engine;
    use knotify_store::Store;
    use tower::ServiceExt;

    fn test_state(store: Arc<Store>) -> Arc<AppState> {
        let engine = Arc::new(Engine::new(store, &KnotifyConfig::default()));
        Arc::new(AppState { engine, start_time: std::time::Instant::now() })
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let app = router(test_state(store));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "knotify-gateway");
    }

    #[tokio::test]
    async fn test_get_trigger_returns_usage_only() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let msg = ScheduledMessage::new(
            "ev1",
            "hi",
            Utc::now() - chrono::Duration::minutes(1),
            MessageTarget::all(),
        );
        store.insert_message(&msg).unwrap();

        let app = router(test_state(store.clone()));
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/messages/process-scheduled")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["method"], "POST");
        // Read-only: nothing was processed.
        assert_eq!(
            store.get_message(&msg.id).unwrap().unwrap().status,
            MessageStatus::Scheduled
        );
    }

    #[tokio::test]
    async fn test_post_trigger_processes_and_reports_counts() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut guest = Guest::new("ev1", "Mai Anh");
        guest.phone = Some("+15550000001".into());
        store.insert_guest(&guest).unwrap();
        let msg = ScheduledMessage::new(
            "ev1",
            "Hi {name}",
            Utc::now() - chrono::Duration::minutes(1),
            MessageTarget::all(),
        );
        store.insert_message(&msg).unwrap();

        let app = router(test_state(store.clone()));
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/messages/process-scheduled")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["processed"], 1);
        assert_eq!(json["sent"], 1);
        assert_eq!(json["failed"], 0);
        assert_eq!(
            store.get_message(&msg.id).unwrap().unwrap().status,
            MessageStatus::Sent
        );
    }
}
