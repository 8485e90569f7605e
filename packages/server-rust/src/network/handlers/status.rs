//! `GET /status`: monitoring, batcher, and router state in one document.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::AppState;

pub async fn status_handler(State(state): State<AppState>) -> Response {
    match state.monitor.get_status().await {
        Ok(monitoring) => Json(json!({
            "monitoring": monitoring,
            "batcher": state.pipeline.batcher().get_metrics(),
            "router": state.pipeline.router().get_metrics(),
            "errors": state.pipeline.error_counts(),
        }))
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::network::handlers::test_support::test_state;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn status_combines_components() {
        let state = test_state(None).await;
        state.pipeline.ingest(b"not json").await.unwrap_err();

        let response = status_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["monitoring"]["isConnected"], true);
        assert_eq!(body["monitoring"]["activeTasks"].as_array().unwrap().len(), 3);
        assert_eq!(body["batcher"]["total_batches"], 0);
        assert_eq!(body["router"]["total_operations"], 0);
        assert_eq!(body["errors"]["parse"], 1);
    }

    #[tokio::test]
    async fn stopped_monitor_is_unavailable() {
        let state = test_state(None).await;
        state.monitor.shutdown().await.unwrap();

        let response = status_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
