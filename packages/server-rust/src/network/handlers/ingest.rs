//! `POST /chainhook`: webhook intake.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use subtle::ConstantTimeEq;

use super::AppState;

/// Decodes a Chainhook delivery and enqueues its transactions.
///
/// 202 with the ingest summary, 400 for an invalid payload, 401 for a
/// missing or wrong bearer token, 503 once shutdown has begun.
pub async fn chainhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_authorized(state.config.auth_token.as_deref(), &headers) {
        return error_response(StatusCode::UNAUTHORIZED, "missing or invalid bearer token");
    }
    let Some(_guard) = state.shutdown.try_acquire() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "server is shutting down");
    };

    match state.pipeline.ingest(&body).await {
        Ok(summary) => (StatusCode::ACCEPTED, Json(summary)).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

fn is_authorized(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match provided {
        Some(token) => token.as_bytes().ct_eq(expected.as_bytes()).into(),
        None => false,
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
