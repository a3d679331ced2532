pub mod auth;
pub mod cart;
pub mod customers;
pub mod dashboard;
pub mod files;
pub mod health;
pub mod orders;
pub mod products;

use axum::Json;
use axum::extract::Multipart;
use axum::extract::rejection::JsonRejection;
use bytes::Bytes;

use crate::error::ApiError;

/// Parses an id from a path segment, reporting a 400 on malformed input.
pub(crate) fn parse_id<T>(
    raw: &str,
    parse: impl FnOnce(&str) -> Result<T, uuid::Error>,
    label: &str,
) -> Result<T, ApiError> {
    parse(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {label}: {e}")))
}

/// Unwraps a JSON body, reporting a 400 with the rejection reason.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e.body_text())))
}

/// An uploaded file taken from the `file` field of a multipart body.
pub(crate) struct Upload {
    pub file_name: Option<String>,
    pub data: Bytes,
}

pub(crate) async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(functions::routes::files::FILE_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Could not read upload: {e}")))?;
        if data.is_empty() {
            break;
        }
        return Ok(Upload { file_name, data });
    }
    Err(ApiError::BadRequest("Please select a file to upload".to_string()))
}
