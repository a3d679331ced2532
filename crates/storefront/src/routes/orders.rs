//! Order listing, admin order entry and status changes.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::OrderId;
use domain::{Order, OrderAction, OrderStatus};
use functions::models::{OrderStatusResponse, ProcessOrderResponse};
use serde::Deserialize;
use store::Store;

use super::{json_body, parse_id};
use crate::AppState;
use crate::error::ApiError;
use crate::services::NewOrder;
use crate::session::{AdminUser, CurrentUser};

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

fn order_id(raw: &str) -> Result<OrderId, ApiError> {
    parse_id(raw, OrderId::parse, "order id")
}

/// GET /orders: all orders for administrators, own orders for customers.
#[tracing::instrument(skip(state, user))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.visible_to(&user.0).await?))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state, user))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id = order_id(&id)?;
    Ok(Json(state.orders.get_for(&user.0, id).await?))
}

/// POST /orders: admin places an order for a customer.
#[tracing::instrument(skip(state, admin, body), fields(admin = %admin.0.username))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    body: Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let request = json_body(body)?;
    let order = state.orders.place(request, &admin.0.username).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// POST /orders/{id}/status: moves the order through the functions
/// service, which also restores stock on cancellation.
#[tracing::instrument(skip(state, admin, body), fields(admin = %admin.0.username))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<String>,
    body: Result<Json<StatusChange>, JsonRejection>,
) -> Result<Json<ProcessOrderResponse>, ApiError> {
    let id = order_id(&id)?;
    let change = json_body(body)?;
    let status: OrderStatus = change.status.parse()?;
    let action = OrderAction::leading_to(status).ok_or_else(|| {
        ApiError::BadRequest(format!("Orders cannot be moved back to {status}"))
    })?;

    let response = state.functions.process_order(id, action).await?;
    Ok(Json(response))
}

/// GET /orders/{id}/remote-status: the status as the functions service sees it.
#[tracing::instrument(skip(state, user))]
pub async fn remote_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderStatusResponse>, ApiError> {
    let id = order_id(&id)?;
    state.orders.get_for(&user.0, id).await?;
    Ok(Json(state.functions.order_status(id).await?))
}

/// DELETE /orders/{id}
#[tracing::instrument(skip(state, admin), fields(admin = %admin.0.username))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = order_id(&id)?;
    state.orders.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
