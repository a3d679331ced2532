//! Customer records, for administrators.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::CustomerId;
use domain::Customer;
use store::Store;

use super::parse_id;
use crate::AppState;
use crate::error::{ApiError, StorefrontError};
use crate::session::AdminUser;

/// GET /customers
#[tracing::instrument(skip(state, _admin))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
) -> Result<Json<Vec<Customer>>, ApiError> {
    Ok(Json(state.store.list_customers().await?))
}

/// GET /customers/{id}
#[tracing::instrument(skip(state, _admin))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<Customer>, ApiError> {
    let id = parse_id(&id, CustomerId::parse, "customer id")?;
    let customer = state
        .store
        .get_customer(id)
        .await?
        .ok_or(StorefrontError::CustomerNotFound(id))?;
    Ok(Json(customer))
}
