//! The logged-in user's cart and checkout.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ProductId;
use domain::{CartLine, CartSummary};
use serde::{Deserialize, Serialize};
use store::Store;

use super::{json_body, parse_id};
use crate::AppState;
use crate::error::ApiError;
use crate::services::CheckoutReceipt;
use crate::session::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct CartCountResponse {
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct UpdatedLineResponse {
    /// `None` when the line was removed.
    pub line: Option<CartLine>,
}

/// GET /cart
#[tracing::instrument(skip(state, user), fields(username = %user.0.username))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
) -> Result<Json<CartSummary>, ApiError> {
    Ok(Json(state.carts.summary(user.0.user_id).await?))
}

/// GET /cart/count
pub async fn count<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<CartCountResponse>, ApiError> {
    let count = state.carts.count(session.user_id).await?;
    Ok(Json(CartCountResponse { count }))
}

/// POST /cart/items
#[tracing::instrument(skip(state, user, body), fields(username = %user.0.username))]
pub async fn add<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    body: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<Json<CartLine>, ApiError> {
    let request = json_body(body)?;
    let line = state
        .carts
        .add(user.0.user_id, request.product_id, request.quantity)
        .await?;
    Ok(Json(line))
}

/// PUT /cart/items/{product_id}
#[tracing::instrument(skip(state, user, body), fields(username = %user.0.username))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(product_id): Path<String>,
    body: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<UpdatedLineResponse>, ApiError> {
    let product_id = parse_id(&product_id, ProductId::parse, "product id")?;
    let request = json_body(body)?;
    let line = state
        .carts
        .update(user.0.user_id, product_id, request.quantity)
        .await?;
    Ok(Json(UpdatedLineResponse { line }))
}

/// DELETE /cart/items/{product_id}
#[tracing::instrument(skip(state, user), fields(username = %user.0.username))]
pub async fn remove<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(product_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let product_id = parse_id(&product_id, ProductId::parse, "product id")?;
    state.carts.remove(user.0.user_id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cart/checkout: one order per cart line, placed for the customer
/// record that shares the session's username.
#[tracing::instrument(skip(state, user), fields(username = %user.0.username))]
pub async fn checkout<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
) -> Result<(StatusCode, Json<CheckoutReceipt>), ApiError> {
    let CurrentUser(session) = user;
    let receipt = state
        .carts
        .checkout(session.user_id, &session.username)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
