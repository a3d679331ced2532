//! Order viewing and administrator-placed orders.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, ProductId};
use domain::{Order, StockMovement, StockReason};
use serde::Deserialize;
use store::Store;

use super::withdraw;
use crate::error::StorefrontError;
use crate::session::Session;

/// An order entered by an administrator on a customer's behalf.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Defaults to now.
    pub order_date: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct OrderService<S: Store> {
    store: S,
}

impl<S: Store> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Every order for administrators; a customer's own orders otherwise.
    #[tracing::instrument(skip(self, session), fields(username = %session.username))]
    pub async fn visible_to(&self, session: &Session) -> Result<Vec<Order>, StorefrontError> {
        let orders = if session.is_admin() {
            self.store.list_orders().await?
        } else {
            self.store.list_orders_for_username(&session.username).await?
        };
        Ok(orders)
    }

    /// One order, if `session` may see it.
    #[tracing::instrument(skip(self, session), fields(username = %session.username))]
    pub async fn get_for(&self, session: &Session, id: OrderId) -> Result<Order, StorefrontError> {
        let order = self
            .store
            .get_order(id)
            .await?
            .ok_or(StorefrontError::OrderNotFound(id))?;
        if !session.is_admin() && !order.is_owned_by(&session.username) {
            return Err(StorefrontError::NotOrderOwner);
        }
        Ok(order)
    }

    /// Places an order and takes its quantity out of stock.
    ///
    /// Stock is taken first; it is given back if the order cannot be saved.
    #[tracing::instrument(skip(self, request), fields(customer_id = %request.customer_id, product_id = %request.product_id))]
    pub async fn place(&self, request: NewOrder, placed_by: &str) -> Result<Order, StorefrontError> {
        let customer = self
            .store
            .get_customer(request.customer_id)
            .await?
            .ok_or(StorefrontError::CustomerNotFound(request.customer_id))?;
        let product = self
            .store
            .get_product(request.product_id)
            .await?
            .ok_or(StorefrontError::ProductNotFound(request.product_id))?;

        let order_date = request.order_date.unwrap_or_else(Utc::now);
        let placed = Order::place(&customer, &product, request.quantity, order_date)?;

        let change = withdraw(&self.store, &product, request.quantity).await?;
        if let Err(e) = self.store.insert_order(&placed.order).await {
            self.store.restock(product.id, request.quantity).await?;
            return Err(e.into());
        }
        self.store
            .record_stock_movement(&StockMovement::new(
                product.id,
                change.previous,
                change.current,
                StockReason::Checkout,
                placed_by,
            ))
            .await?;

        metrics::counter!("orders_placed_total", "source" => "admin").increment(1);
        tracing::info!(order_id = %placed.order.id, total = %placed.order.total_price, "order placed");
        Ok(placed.order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: OrderId) -> Result<(), StorefrontError> {
        if !self.store.delete_order(id).await? {
            return Err(StorefrontError::OrderNotFound(id));
        }
        Ok(())
    }
}
