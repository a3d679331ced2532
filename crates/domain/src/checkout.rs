//! Turning a cart into orders.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::ProductId;

use crate::account::Customer;
use crate::cart::Cart;
use crate::error::DomainError;
use crate::order::{Order, PlacedOrder};
use crate::product::Product;

/// Everything a checkout will write, computed before any write happens.
#[derive(Debug, Clone)]
pub struct CheckoutPlan {
    /// One order per cart line, in cart order.
    pub orders: Vec<PlacedOrder>,
    /// Cart lines whose product no longer exists.
    pub skipped: Vec<ProductId>,
}

impl CheckoutPlan {
    /// Products with their final stock levels, one entry per product.
    pub fn products(&self) -> Vec<&Product> {
        let mut latest: HashMap<ProductId, &Product> = HashMap::new();
        for placed in &self.orders {
            latest.insert(placed.product.id, &placed.product);
        }
        let mut products: Vec<&Product> = latest.into_values().collect();
        products.sort_by_key(|p| p.id);
        products
    }
}

/// Plans a checkout of `cart` for `customer`.
///
/// Every line is checked against current stock first; a single short line
/// rejects the whole checkout.
pub fn plan_checkout(
    cart: &Cart,
    products: &HashMap<ProductId, Product>,
    customer: &Customer,
    order_date: DateTime<Utc>,
) -> Result<CheckoutPlan, DomainError> {
    if cart.is_empty() {
        return Err(DomainError::EmptyCart);
    }

    // Stock levels as they will be after the lines planned so far.
    let mut working: HashMap<ProductId, Product> = HashMap::new();
    let mut orders = Vec::with_capacity(cart.lines().len());
    let mut skipped = Vec::new();

    for line in cart.lines() {
        let product = match working.get(&line.product_id) {
            Some(product) => product,
            None => match products.get(&line.product_id) {
                Some(product) => product,
                None => {
                    skipped.push(line.product_id);
                    continue;
                }
            },
        };

        let placed = Order::place(customer, product, line.quantity, order_date)?;
        working.insert(placed.product.id, placed.product.clone());
        orders.push(placed);
    }

    if orders.is_empty() {
        return Err(DomainError::EmptyCart);
    }

    Ok(CheckoutPlan { orders, skipped })
}
