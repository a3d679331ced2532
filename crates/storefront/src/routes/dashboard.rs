//! Landing page data for administrators and customers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use domain::{Product, Role};
use serde::Serialize;
use store::Store;

use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

/// Products shown on the dashboard.
pub const FEATURED_PRODUCTS: usize = 5;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub role: Role,
    pub username: String,
    pub featured_products: Vec<Product>,
    pub product_count: u64,
    /// Administrators only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_count: Option<u64>,
    /// Administrators only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_count: Option<u64>,
}

/// GET /dashboard
#[tracing::instrument(skip(state, session), fields(username = %session.username))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(session): CurrentUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    let mut featured_products = state.store.list_products().await?;
    featured_products.truncate(FEATURED_PRODUCTS);
    let counts = state.store.counts().await?;
    let admin = session.is_admin();

    Ok(Json(DashboardResponse {
        role: session.role,
        username: session.username,
        featured_products,
        product_count: counts.products,
        customer_count: admin.then_some(counts.customers),
        order_count: admin.then_some(counts.orders),
    }))
}
