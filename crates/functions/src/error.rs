//! Error types for the functions service and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::{OrderId, ProductId};
use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// Errors raised by the order, stock and file functions.
#[derive(Debug, Error)]
pub enum FunctionsError {
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("File not found: {0}")]
    FileNotFound(String),

    /// File names may not contain path separators or `..`.
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("File storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl FunctionsError {
    /// The HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            FunctionsError::OrderNotFound(_)
            | FunctionsError::ProductNotFound(_)
            | FunctionsError::FileNotFound(_) => StatusCode::NOT_FOUND,
            FunctionsError::InvalidFileName(_) => StatusCode::BAD_REQUEST,
            FunctionsError::Domain(err) => match err {
                DomainError::InvalidStatusTransition { .. } => StatusCode::CONFLICT,
                DomainError::CartLineNotFound { .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            },
            FunctionsError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            FunctionsError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            FunctionsError::Store(_) | FunctionsError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or wrong `x-functions-key`.
    Unauthorized,
    /// Error raised by one of the functions.
    Functions(FunctionsError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Missing or invalid function key".to_string(),
            ),
            ApiError::Functions(err) => {
                let status = err.status();
                if status.is_server_error() {
                    tracing::error!(error = %err, "internal server error");
                }
                (status, err.to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<FunctionsError> for ApiError {
    fn from(err: FunctionsError) -> Self {
        ApiError::Functions(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Functions(err.into())
    }
}
