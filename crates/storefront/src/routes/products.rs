//! Catalog browsing and maintenance, product images and stock.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use common::ProductId;
use domain::{Product, ProductDraft, StockMovement, StockReason};
use functions::models::{
    LowStockResponse, StockHistoryResponse, StockUpdateResponse, UpdateStockRequest,
};
use serde::Deserialize;
use store::Store;

use super::{json_body, parse_id, read_upload};
use crate::AppState;
use crate::error::{ApiError, StorefrontError};
use crate::session::{AdminUser, CurrentUser};

/// Stock history note for levels changed through the product form.
const PRODUCT_EDIT_NOTE: &str = "Product edited";

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StockChange {
    pub new_stock: u32,
    #[serde(default)]
    pub reason: String,
}

async fn load<S: Store>(state: &AppState<S>, id: ProductId) -> Result<Product, ApiError> {
    Ok(state
        .store
        .get_product(id)
        .await?
        .ok_or(StorefrontError::ProductNotFound(id))?)
}

/// GET /products
#[tracing::instrument(skip(state, _user))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.store.list_products().await?))
}

/// GET /products/{id}
#[tracing::instrument(skip(state, _user))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let id = parse_id(&id, ProductId::parse, "product id")?;
    Ok(Json(load(&state, id).await?))
}

/// POST /products
#[tracing::instrument(skip(state, admin, body), fields(admin = %admin.0.username))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    body: Result<Json<ProductDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = json_body(body)?.into_product()?;
    state.store.insert_product(&product).await?;
    tracing::info!(product_id = %product.id, name = %product.name, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /products/{id}
#[tracing::instrument(skip(state, admin, body), fields(admin = %admin.0.username))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<String>,
    body: Result<Json<ProductDraft>, JsonRejection>,
) -> Result<Json<Product>, ApiError> {
    let id = parse_id(&id, ProductId::parse, "product id")?;
    let draft = json_body(body)?;
    let mut product = load(&state, id).await?;
    let stock_edit = draft.apply_to(&mut product)?;
    state.store.update_product(&product).await?;

    if let Some(edit) = stock_edit {
        let change = state.store.set_stock(id, edit.new_stock).await?;
        let reason = StockReason::Adjustment(PRODUCT_EDIT_NOTE.to_string());
        metrics::counter!("stock_updates_total", "reason" => reason.kind()).increment(1);
        state
            .store
            .record_stock_movement(&StockMovement::new(
                id,
                change.previous,
                change.current,
                reason,
                admin.0.username.clone(),
            ))
            .await?;
        tracing::info!(
            product_id = %id,
            previous = change.previous,
            new_stock = change.current,
            "stock changed by product edit"
        );
    }
    Ok(Json(load(&state, id).await?))
}

/// DELETE /products/{id}
#[tracing::instrument(skip(state, admin), fields(admin = %admin.0.username))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, ProductId::parse, "product id")?;
    if !state.store.delete_product(id).await? {
        return Err(StorefrontError::ProductNotFound(id).into());
    }
    tracing::info!(product_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /products/{id}/image: uploads through the functions service and
/// points the product at the stored file.
#[tracing::instrument(skip(state, admin, multipart), fields(admin = %admin.0.username))]
pub async fn upload_image<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Product>, ApiError> {
    let id = parse_id(&id, ProductId::parse, "product id")?;
    load(&state, id).await?;
    let upload = read_upload(multipart).await?;

    let stored = state
        .functions
        .upload_image(upload.file_name, upload.data)
        .await?;
    state.store.set_product_image(id, &stored.file_url).await?;
    Ok(Json(load(&state, id).await?))
}

/// GET /products/low-stock?threshold=N
#[tracing::instrument(skip(state, _admin))]
pub async fn low_stock<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<LowStockResponse>, ApiError> {
    Ok(Json(state.functions.low_stock(query.threshold).await?))
}

/// POST /products/{id}/stock: sets the stock level through the functions service.
#[tracing::instrument(skip(state, admin, body), fields(admin = %admin.0.username))]
pub async fn update_stock<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<String>,
    body: Result<Json<StockChange>, JsonRejection>,
) -> Result<Json<StockUpdateResponse>, ApiError> {
    let product_id = parse_id(&id, ProductId::parse, "product id")?;
    let change = json_body(body)?;
    let AdminUser(session) = admin;
    let request = UpdateStockRequest {
        product_id,
        new_stock: change.new_stock,
        updated_by: session.username,
        reason: change.reason,
    };
    Ok(Json(state.functions.update_stock(request).await?))
}

/// GET /products/{id}/stock-history
#[tracing::instrument(skip(state, _admin))]
pub async fn stock_history<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<StockHistoryResponse>, ApiError> {
    let product_id = parse_id(&id, ProductId::parse, "product id")?;
    Ok(Json(state.functions.stock_history(product_id).await?))
}
