//! ProcessOrder and GetOrderStatus.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::OrderId;
use store::Store;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;
use crate::models::{OrderStatusResponse, ProcessOrderRequest, ProcessOrderResponse};

/// POST /api/orders/process: approve, complete or cancel an order.
#[tracing::instrument(skip(state, body))]
pub async fn process<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<ProcessOrderRequest>, JsonRejection>,
) -> Result<Json<ProcessOrderResponse>, ApiError> {
    let Json(request) =
        body.map_err(|e| ApiError::BadRequest(format!("Invalid order data: {}", e.body_text())))?;
    let response = state.orders.process(request.order_id, request.action).await?;
    Ok(Json(response))
}

/// GET /api/orders/{order_id}/status
#[tracing::instrument(skip(state))]
pub async fn status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let order_id = parse_id(&order_id, OrderId::parse, "order id")?;
    Ok(Json(state.orders.status(order_id).await?))
}
