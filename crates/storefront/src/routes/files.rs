//! File management for administrators, backed by the functions service.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use functions::models::{DeleteResponse, FileInfo, UploadResponse};
use functions::services::FileKind;
use serde::Serialize;
use store::Store;

use super::read_upload;
use crate::AppState;
use crate::error::ApiError;
use crate::session::AdminUser;

#[derive(Debug, Serialize)]
pub struct FileListing {
    pub images: Vec<FileInfo>,
    pub contracts: Vec<FileInfo>,
}

/// GET /files
#[tracing::instrument(skip(state, _admin))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
) -> Result<Json<FileListing>, ApiError> {
    let images = state.functions.list_files(FileKind::Image).await?;
    let contracts = state.functions.list_files(FileKind::Contract).await?;
    Ok(Json(FileListing { images, contracts }))
}

/// POST /files/images
#[tracing::instrument(skip(state, admin, multipart), fields(admin = %admin.0.username))]
pub async fn upload_image<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    Ok(Json(
        state
            .functions
            .upload_image(upload.file_name, upload.data)
            .await?,
    ))
}

/// POST /files/contracts: stored under the uploaded file's own name.
#[tracing::instrument(skip(state, admin, multipart), fields(admin = %admin.0.username))]
pub async fn upload_contract<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    let file_name = upload
        .file_name
        .ok_or_else(|| ApiError::BadRequest("Contract upload needs a file name".to_string()))?;
    Ok(Json(
        state
            .functions
            .upload_contract(file_name, upload.data)
            .await?,
    ))
}

/// DELETE /files/{kind}/{name}
#[tracing::instrument(skip(state, admin), fields(admin = %admin.0.username))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path((kind, name)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let kind = FileKind::from_segment(&kind)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown file kind: {kind}")))?;
    let deleted = state.functions.delete_file(kind, &name).await?;
    Ok(Json(DeleteResponse { deleted }))
}
