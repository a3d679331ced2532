//! Storefront error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::{CustomerId, OrderId, ProductId};
use domain::{DomainError, Role};
use store::StoreError;
use thiserror::Error;

use crate::client::ClientError;

/// Errors raised by the storefront services.
#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error("Username already exists")]
    UsernameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The login form picked a role the account does not have.
    #[error("Invalid role selection. This account is registered as {0}.")]
    RoleMismatch(Role),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// The logged-in account has no customer record to order with.
    #[error("Customer profile not found for {0}")]
    NoCustomerProfile(String),

    /// A customer asked for an order placed by someone else.
    #[error("You can only view your own orders")]
    NotOrderOwner,

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StorefrontError {
    /// The HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            StorefrontError::UsernameTaken | StorefrontError::EmailTaken => StatusCode::CONFLICT,
            StorefrontError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            StorefrontError::RoleMismatch(_) => StatusCode::BAD_REQUEST,
            StorefrontError::ProductNotFound(_)
            | StorefrontError::OrderNotFound(_)
            | StorefrontError::CustomerNotFound(_)
            | StorefrontError::NoCustomerProfile(_) => StatusCode::NOT_FOUND,
            StorefrontError::NotOrderOwner => StatusCode::FORBIDDEN,
            StorefrontError::Domain(err) => match err {
                DomainError::InvalidStatusTransition { .. } => StatusCode::CONFLICT,
                DomainError::CartLineNotFound { .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            },
            StorefrontError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            StorefrontError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            StorefrontError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// No valid session.
    Unauthorized,
    /// Logged in, but not as an administrator.
    Forbidden,
    /// Error raised by a storefront service.
    Storefront(StorefrontError),
    /// Error reported by the functions service.
    Functions(ClientError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Please login to continue".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Administrator access required".to_string(),
            ),
            ApiError::Storefront(err) => {
                let status = err.status();
                if status.is_server_error() {
                    tracing::error!(error = %err, "internal server error");
                }
                (status, err.to_string())
            }
            ApiError::Functions(err) => {
                let status = err.status();
                if status.is_server_error() {
                    tracing::error!(error = %err, "functions call failed");
                }
                (status, err.to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StorefrontError> for ApiError {
    fn from(err: StorefrontError) -> Self {
        ApiError::Storefront(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Storefront(err.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Storefront(err.into())
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        ApiError::Functions(err)
    }
}
