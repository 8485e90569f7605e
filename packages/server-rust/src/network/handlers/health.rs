//! Health, liveness, and readiness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::HealthState;

/// Always 200; the body's `state` field carries the lifecycle state.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let batcher = state.pipeline.batcher();
    Json(json!({
        "state": state.shutdown.health_state().as_str(),
        "in_flight": state.shutdown.in_flight_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "queue_length": batcher.queue_len(),
        "node_connected": state.monitor.health().is_connected(),
    }))
}

pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// 200 only in the `Ready` state.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::handlers::test_support::test_state;

    #[tokio::test]
    async fn health_reports_state_and_queue() {
        let state = test_state(None).await;
        let body = health_handler(State(state.clone())).await.0;

        assert_eq!(body["state"], "ready");
        assert_eq!(body["in_flight"], 0);
        assert_eq!(body["queue_length"], 0);
        assert_eq!(body["node_connected"], true);
        assert!(body["uptime_secs"].is_number());

        state.shutdown.trigger_shutdown();
        let body = health_handler(State(state)).await.0;
        assert_eq!(body["state"], "draining");
    }

    #[tokio::test]
    async fn liveness_is_unconditional() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_follows_lifecycle() {
        let state = test_state(None).await;
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::OK);

        state.shutdown.trigger_shutdown();
        assert_eq!(
            readiness_handler(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
