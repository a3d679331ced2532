//! The order record and the rules that create and move it.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};

use super::{OrderAction, OrderStatus};
use crate::account::Customer;
use crate::error::DomainError;
use crate::product::Product;

/// A single-product purchase placed by a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub username: String,
    pub product_id: ProductId,
    /// Product name at the time of ordering.
    pub product_name: String,
    pub order_date: DateTime<Utc>,
    pub quantity: u32,
    /// Unit price at the time of ordering.
    pub unit_price: Money,
    pub total_price: Money,
    pub status: OrderStatus,
}

/// An order ready to be persisted together with the product it drew stock from.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    /// The product with `stock_available` already reduced by the order quantity.
    pub product: Product,
    pub previous_stock: u32,
}

/// What happened when an order moved to a new status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Units to give back to the product; zero unless the order was cancelled.
    pub stock_to_restore: u32,
}

impl Order {
    /// Places an order for `quantity` units of `product`.
    ///
    /// Checks `stock_available >= quantity` and returns both the new
    /// `Submitted` order and the product with its stock decremented. Nothing
    /// is written here; the caller persists the order and then the product.
    pub fn place(
        customer: &Customer,
        product: &Product,
        quantity: u32,
        order_date: DateTime<Utc>,
    ) -> Result<PlacedOrder, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity: 0 });
        }

        let total_price = product
            .price
            .multiply(quantity)
            .ok_or_else(DomainError::total_too_large)?;

        let mut product = product.clone();
        let previous_stock = product.stock_available;
        product.withdraw(quantity)?;

        let order = Order {
            id: OrderId::new(),
            customer_id: customer.id,
            username: customer.username.clone(),
            product_id: product.id,
            product_name: product.name.clone(),
            order_date,
            quantity,
            unit_price: product.price,
            total_price,
            status: OrderStatus::Submitted,
        };

        Ok(PlacedOrder {
            order,
            product,
            previous_stock,
        })
    }

    /// Applies an operator action, enforcing the status state machine.
    pub fn transition(&mut self, action: OrderAction) -> Result<Transition, DomainError> {
        let from = self.status;
        let to = action.target_status();

        if !from.can_transition_to(to) {
            return Err(DomainError::InvalidStatusTransition { from, to });
        }

        self.status = to;
        Ok(Transition {
            from,
            to,
            stock_to_restore: if from.restores_stock(to) {
                self.quantity
            } else {
                0
            },
        })
    }

    /// Returns true if the order belongs to `username`.
    pub fn is_owned_by(&self, username: &str) -> bool {
        self.username == username
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{customer, product};

    #[test]
    fn place_decrements_stock_and_prices_order() {
        let widget = product("Widget", 1250, 10);
        let placed = Order::place(&customer(), &widget, 3, Utc::now()).unwrap();

        assert_eq!(placed.order.status, OrderStatus::Submitted);
        assert_eq!(placed.order.quantity, 3);
        assert_eq!(placed.order.unit_price.cents(), 1250);
        assert_eq!(placed.order.total_price.cents(), 3750);
        assert_eq!(placed.order.product_name, "Widget");
        assert_eq!(placed.order.username, "jdoe");
        assert_eq!(placed.product.stock_available, 7);
        assert_eq!(placed.previous_stock, 10);
        // Input product is untouched.
        assert_eq!(widget.stock_available, 10);
    }

    #[test]
    fn place_rejects_zero_quantity() {
        let widget = product("Widget", 1250, 10);
        let err = Order::place(&customer(), &widget, 0, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::InvalidQuantity { quantity: 0 });
    }

    #[test]
    fn place_reports_total_overflow_instead_of_panicking() {
        // Stored before the price cap existed.
        let mut yacht = product("Yacht", 100, 5);
        yacht.price = Money::from_cents(i64::MAX / 2 + 1);

        let err = Order::place(&customer(), &yacht, 2, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::total_too_large());
        assert!(Order::place(&customer(), &yacht, 1, Utc::now()).is_ok());
    }

    #[test]
    fn place_rejects_insufficient_stock() {
        let widget = product("Widget", 1250, 2);
        let err = Order::place(&customer(), &widget, 3, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            }
        ));
    }

    #[test]
    fn happy_path_transitions_do_not_touch_stock() {
        let widget = product("Widget", 100, 5);
        let mut order = Order::place(&customer(), &widget, 2, Utc::now()).unwrap().order;

        let t = order.transition(OrderAction::Approve).unwrap();
        assert_eq!((t.from, t.to, t.stock_to_restore), (OrderStatus::Submitted, OrderStatus::Processing, 0));

        let t = order.transition(OrderAction::Complete).unwrap();
        assert_eq!((t.from, t.to, t.stock_to_restore), (OrderStatus::Processing, OrderStatus::Completed, 0));
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[test]
    fn cancellation_reports_quantity_to_restore() {
        let widget = product("Widget", 100, 5);
        let mut order = Order::place(&customer(), &widget, 4, Utc::now()).unwrap().order;
        order.transition(OrderAction::Approve).unwrap();

        let t = order.transition(OrderAction::Cancel).unwrap();
        assert_eq!(t.stock_to_restore, 4);
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn illegal_transition_leaves_status_unchanged() {
        let widget = product("Widget", 100, 5);
        let mut order = Order::place(&customer(), &widget, 1, Utc::now()).unwrap().order;

        let err = order.transition(OrderAction::Complete).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidStatusTransition {
                from: OrderStatus::Submitted,
                to: OrderStatus::Completed,
            }
        );
        assert_eq!(order.status, OrderStatus::Submitted);

        order.transition(OrderAction::Cancel).unwrap();
        assert!(order.transition(OrderAction::Cancel).is_err());
        assert!(order.transition(OrderAction::Approve).is_err());
    }

    #[test]
    fn ownership_is_by_username() {
        let widget = product("Widget", 100, 5);
        let order = Order::place(&customer(), &widget, 1, Utc::now()).unwrap().order;
        assert!(order.is_owned_by("jdoe"));
        assert!(!order.is_owned_by("someone-else"));
    }
}
