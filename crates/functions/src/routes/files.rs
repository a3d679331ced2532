//! Product image and contract uploads, listings and downloads.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use bytes::Bytes;
use store::Store;

use crate::AppState;
use crate::error::ApiError;
use crate::models::{DeleteResponse, FileInfo, UploadResponse};
use crate::services::files::{FileKind, content_type_for};

/// Name of the multipart field carrying the upload.
pub const FILE_FIELD: &str = "file";

/// Reads the `file` field of a multipart body.
async fn read_file(mut multipart: Multipart) -> Result<(Option<String>, Bytes), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Could not read upload: {e}")))?;
        if data.is_empty() {
            return Err(ApiError::BadRequest("Please select a file to upload".to_string()));
        }
        return Ok((file_name, data));
    }
    Err(ApiError::BadRequest("Please select a file to upload".to_string()))
}

fn kind_from_segment(segment: &str) -> Result<FileKind, ApiError> {
    FileKind::from_segment(segment)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown file kind: {segment}")))
}

/// POST /api/files/upload/image
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_image<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (file_name, data) = read_file(multipart).await?;
    Ok(Json(state.files.upload_image(file_name.as_deref(), data).await?))
}

/// POST /api/files/upload/contract
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_contract<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (file_name, data) = read_file(multipart).await?;
    let file_name = file_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Contract upload needs a file name".to_string()))?;
    Ok(Json(state.files.upload_contract(&file_name, data).await?))
}

/// GET /api/files/images
pub async fn list_images<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<FileInfo>>, ApiError> {
    Ok(Json(state.files.list(FileKind::Image).await?))
}

/// GET /api/files/contracts
pub async fn list_contracts<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<FileInfo>>, ApiError> {
    Ok(Json(state.files.list(FileKind::Contract).await?))
}

/// GET /api/files/{kind}/{name}
#[tracing::instrument(skip(state))]
pub async fn download<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = kind_from_segment(&kind)?;
    let data = state.files.download(kind, &name).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&name))], data))
}

/// DELETE /api/files/{kind}/{name}
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let kind = kind_from_segment(&kind)?;
    let deleted = state.files.delete(kind, &name).await?;
    Ok(Json(DeleteResponse { deleted }))
}
