//! HTTP request handlers.

use crate::server::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Dispatch `<base>/{hash}-{method}` calls; everything else is a 404.
pub async fn handle_dispatch(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    body: Bytes,
) -> Response {
    let path = uri.path();
    match state.dispatcher.handle(path, &body).await {
        Some(response) => {
            let status = if response.client_error {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::OK
            };
            (status, Json(response.reply)).into_response()
        }
        None => {
            debug!("No dispatch route for {}", path);
            (
                StatusCode::NOT_FOUND,
                Json(json!({"error": format!("not found: {}", path)})),
            )
                .into_response()
        }
    }
}
