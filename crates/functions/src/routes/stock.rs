//! UpdateStock, GetLowStockProducts and GetStockHistory.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use common::ProductId;
use serde::Deserialize;
use store::Store;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;
use crate::models::{LowStockResponse, StockHistoryResponse, StockUpdateResponse, UpdateStockRequest};

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<u32>,
}

/// POST /api/stock/update
#[tracing::instrument(skip(state, body))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<UpdateStockRequest>, JsonRejection>,
) -> Result<Json<StockUpdateResponse>, ApiError> {
    let Json(request) = body
        .map_err(|e| ApiError::BadRequest(format!("Invalid stock update data: {}", e.body_text())))?;
    if request.updated_by.trim().is_empty() {
        return Err(ApiError::BadRequest("updated_by is required".to_string()));
    }
    Ok(Json(state.stock.update(request).await?))
}

/// GET /api/stock/low?threshold=N
#[tracing::instrument(skip(state))]
pub async fn low<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<LowStockResponse>, ApiError> {
    Ok(Json(state.stock.low_stock(query.threshold).await?))
}

/// GET /api/stock/history/{product_id}
#[tracing::instrument(skip(state))]
pub async fn history<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<String>,
) -> Result<Json<StockHistoryResponse>, ApiError> {
    let product_id = parse_id(&product_id, ProductId::parse, "product id")?;
    Ok(Json(state.stock.history(product_id).await?))
}
