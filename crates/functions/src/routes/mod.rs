pub mod files;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod queues;
pub mod stock;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;

/// Header carrying the shared function key.
pub const FUNCTION_KEY_HEADER: &str = "x-functions-key";

/// Rejects requests without the configured function key. No key configured
/// means every request is accepted.
pub async fn require_function_key(
    State(expected): State<Option<Arc<str>>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = expected {
        let matches = request
            .headers()
            .get(FUNCTION_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|provided| domain::secrets_match(provided, &expected));
        if !matches {
            tracing::warn!(path = %request.uri().path(), "rejected request without valid function key");
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

/// Parses an id from a path segment, reporting a 400 on malformed input.
pub(crate) fn parse_id<T>(
    raw: &str,
    parse: impl FnOnce(&str) -> Result<T, uuid::Error>,
    label: &str,
) -> Result<T, ApiError> {
    parse(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {label}: {e}")))
}
