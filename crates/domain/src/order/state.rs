//! Order status state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Submitted ──► Processing ──► Completed
///     │             │
///     └─────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order has been placed and awaits review.
    #[default]
    Submitted,

    /// The store has approved the order and is fulfilling it.
    Processing,

    /// Order was delivered to the customer (terminal state).
    Completed,

    /// Order was cancelled and its stock returned (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Submitted, OrderStatus::Processing)
                | (OrderStatus::Processing, OrderStatus::Completed)
                | (
                    OrderStatus::Submitted | OrderStatus::Processing,
                    OrderStatus::Cancelled
                )
        )
    }

    /// Returns true if moving to `next` gives the ordered quantity back to stock.
    pub fn restores_stock(&self, next: OrderStatus) -> bool {
        next == OrderStatus::Cancelled && self.can_transition_to(next)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Submitted => "Submitted",
            OrderStatus::Processing => "Processing",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "submitted" => Ok(OrderStatus::Submitted),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            _ => Err(DomainError::UnknownStatus(s.to_string())),
        }
    }
}

/// An operator action that moves an order along its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderAction {
    /// Submitted → Processing.
    Approve,
    /// Processing → Completed.
    Complete,
    /// Submitted/Processing → Cancelled.
    Cancel,
}

impl OrderAction {
    /// The status an order ends up in after this action.
    pub fn target_status(&self) -> OrderStatus {
        match self {
            OrderAction::Approve => OrderStatus::Processing,
            OrderAction::Complete => OrderStatus::Completed,
            OrderAction::Cancel => OrderStatus::Cancelled,
        }
    }

    /// The action that leads into `status`, if any.
    pub fn leading_to(status: OrderStatus) -> Option<OrderAction> {
        match status {
            OrderStatus::Processing => Some(OrderAction::Approve),
            OrderStatus::Completed => Some(OrderAction::Complete),
            OrderStatus::Cancelled => Some(OrderAction::Cancel),
            OrderStatus::Submitted => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Approve => "approve",
            OrderAction::Complete => "complete",
            OrderAction::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(OrderAction::Approve),
            "complete" => Ok(OrderAction::Complete),
            "cancel" => Ok(OrderAction::Cancel),
            _ => Err(DomainError::UnknownAction(s.to_string())),
        }
    }
}
