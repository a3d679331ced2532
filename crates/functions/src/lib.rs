//! Companion functions service for the storefront.
//!
//! Owns order status processing, stock adjustments, file storage and the
//! notification queues. The storefront calls it over HTTP, or in-process
//! through [`AppState`] when no remote URL is configured.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{ApiError, FunctionsError};
use services::{FileManagement, FileStore, NotificationQueue, OrderProcessing, StockManagement};

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub orders: OrderProcessing<S>,
    pub stock: StockManagement<S>,
    pub files: FileManagement,
    pub queue: Arc<dyn NotificationQueue>,
    pub functions_key: Option<Arc<str>>,
}

impl<S: Store> AppState<S> {
    pub fn new(
        store: S,
        files: Arc<dyn FileStore>,
        queue: Arc<dyn NotificationQueue>,
        config: &config::Config,
    ) -> Self {
        Self {
            orders: OrderProcessing::new(store.clone(), queue.clone()),
            stock: StockManagement::new(store, queue.clone(), config.low_stock_threshold),
            files: FileManagement::new(files, config.public_base_url.clone()),
            queue,
            functions_key: config.functions_key.as_deref().map(Arc::from),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let api = Router::new()
        .route("/api/orders/process", post(routes::orders::process::<S>))
        .route("/api/orders/{order_id}/status", get(routes::orders::status::<S>))
        .route("/api/stock/update", post(routes::stock::update::<S>))
        .route("/api/stock/low", get(routes::stock::low::<S>))
        .route("/api/stock/history/{product_id}", get(routes::stock::history::<S>))
        .route("/api/files/upload/image", post(routes::files::upload_image::<S>))
        .route("/api/files/upload/contract", post(routes::files::upload_contract::<S>))
        .route("/api/files/images", get(routes::files::list_images::<S>))
        .route("/api/files/contracts", get(routes::files::list_contracts::<S>))
        .route(
            "/api/files/{kind}/{name}",
            get(routes::files::download::<S>).delete(routes::files::delete::<S>),
        )
        .route("/api/queues/{queue}/next", get(routes::queues::next::<S>))
        .route_layer(axum::middleware::from_fn_with_state(
            state.functions_key.clone(),
            routes::require_function_key,
        ))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    Router::new()
        .route("/health", get(routes::health::check))
        .merge(api)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
