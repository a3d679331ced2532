//! Draining notification queues.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use store::Store;

use crate::AppState;

/// GET /api/queues/{queue}/next: pops the oldest message, 204 when empty.
#[tracing::instrument(skip(state))]
pub async fn next<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(queue): Path<String>,
) -> Response {
    match state.queue.receive(&queue).await {
        Some(message) => Json(message).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
