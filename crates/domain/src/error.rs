//! Domain error types.

use common::ProductId;
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised when a request violates a storefront business rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Quantity must be at least one unit.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: i64 },

    /// Not enough stock to satisfy the request.
    #[error("Insufficient stock for {product_name}: requested {requested}, only {available} available")]
    InsufficientStock {
        product_name: String,
        available: u32,
        requested: u32,
    },

    /// The order cannot move from its current status to the requested one.
    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    #[error("Unknown order action: {0}")]
    UnknownAction(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// The product is not in the cart.
    #[error("Cart item not found: {product_id}")]
    CartLineNotFound { product_id: ProductId },

    /// Checkout was requested with nothing in the cart.
    #[error("Your cart is empty")]
    EmptyCart,

    /// Input failed validation.
    #[error("{0}")]
    Validation(String),
}

impl DomainError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    /// A price or total that does not fit in a money amount.
    pub fn total_too_large() -> Self {
        DomainError::Validation("Order total is too large".to_string())
    }
}
