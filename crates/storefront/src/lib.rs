//! Storefront web API.
//!
//! Accounts and sessions, the product catalog, carts and checkout, and order
//! management. Stock adjustments, order status changes and file storage are
//! delegated to the functions service through [`client::FunctionsClient`].

pub mod client;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{delete, get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use client::FunctionsClient;
use services::{AccountService, CartService, OrderService};
use session::SessionStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub store: S,
    pub sessions: SessionStore,
    pub functions: Arc<dyn FunctionsClient>,
    pub accounts: AccountService<S>,
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, functions: Arc<dyn FunctionsClient>, config: &config::Config) -> Self {
        Self {
            sessions: SessionStore::new(Duration::from_secs(config.session_ttl_minutes * 60)),
            functions,
            accounts: AccountService::new(store.clone()),
            carts: CartService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            store,
        }
    }
}

impl<S: Store> FromRef<Arc<AppState<S>>> for SessionStore {
    fn from_ref(state: &Arc<AppState<S>>) -> Self {
        state.sessions.clone()
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(functions::routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/auth/register", post(routes::auth::register::<S>))
        .route("/auth/login", post(routes::auth::login::<S>))
        .route("/auth/logout", post(routes::auth::logout::<S>))
        .route("/auth/me", get(routes::auth::me))
        .route("/dashboard", get(routes::dashboard::get::<S>))
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route("/products/low-stock", get(routes::products::low_stock::<S>))
        .route(
            "/products/{id}",
            get(routes::products::get::<S>)
                .put(routes::products::update::<S>)
                .delete(routes::products::delete::<S>),
        )
        .route("/products/{id}/image", post(routes::products::upload_image::<S>))
        .route("/products/{id}/stock", post(routes::products::update_stock::<S>))
        .route(
            "/products/{id}/stock-history",
            get(routes::products::stock_history::<S>),
        )
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/count", get(routes::cart::count::<S>))
        .route("/cart/items", post(routes::cart::add::<S>))
        .route(
            "/cart/items/{product_id}",
            put(routes::cart::update::<S>).delete(routes::cart::remove::<S>),
        )
        .route("/cart/checkout", post(routes::cart::checkout::<S>))
        .route(
            "/orders",
            get(routes::orders::list::<S>).post(routes::orders::create::<S>),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>).delete(routes::orders::delete::<S>),
        )
        .route("/orders/{id}/status", post(routes::orders::update_status::<S>))
        .route(
            "/orders/{id}/remote-status",
            get(routes::orders::remote_status::<S>),
        )
        .route("/customers", get(routes::customers::list::<S>))
        .route("/customers/{id}", get(routes::customers::get::<S>))
        .route("/files", get(routes::files::list::<S>))
        .route("/files/images", post(routes::files::upload_image::<S>))
        .route("/files/contracts", post(routes::files::upload_contract::<S>))
        .route("/files/{kind}/{name}", delete(routes::files::delete::<S>))
        .layer(DefaultBodyLimit::max(functions::MAX_UPLOAD_BYTES))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
