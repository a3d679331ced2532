//! Order status processing.

use std::sync::Arc;

use chrono::Utc;
use common::{OrderId, ProductId};
use domain::{OrderAction, StockMovement, StockReason};
use store::{Store, StoreError};

use super::notifications::{NotificationQueue, ORDER_NOTIFICATIONS};
use crate::error::FunctionsError;
use crate::models::{OrderNotification, OrderStatusResponse, ProcessOrderResponse};

/// Moves orders through their lifecycle and announces the change.
#[derive(Clone)]
pub struct OrderProcessing<S: Store> {
    store: S,
    queue: Arc<dyn NotificationQueue>,
}

fn customer_message(action: OrderAction) -> &'static str {
    match action {
        OrderAction::Approve => "Your order has been approved and is being processed",
        OrderAction::Complete => "Your order has been completed and delivered",
        OrderAction::Cancel => "Your order has been cancelled",
    }
}

impl<S: Store> OrderProcessing<S> {
    pub fn new(store: S, queue: Arc<dyn NotificationQueue>) -> Self {
        Self { store, queue }
    }

    /// Applies `action` to an order.
    ///
    /// The status change is saved before anything else happens, and only if
    /// no other request moved the order first. Approve and complete
    /// then publish on `order-notifications`; cancel gives the quantity back
    /// to the product if it still exists.
    #[tracing::instrument(skip(self))]
    pub async fn process(
        &self,
        order_id: OrderId,
        action: OrderAction,
    ) -> Result<ProcessOrderResponse, FunctionsError> {
        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(FunctionsError::OrderNotFound(order_id))?;

        let transition = order.transition(action)?;
        // Only the request that still sees the old status gets to move it.
        self.store
            .transition_order(order.id, transition.from, transition.to)
            .await?;

        metrics::counter!("order_transitions_total", "action" => action.as_str()).increment(1);
        tracing::info!(%order_id, from = %transition.from, to = %transition.to, "order status changed");

        let mut stock_restored = 0;
        match action {
            OrderAction::Approve | OrderAction::Complete => {
                let notification = OrderNotification {
                    order_id: order.id,
                    customer_id: order.customer_id,
                    status: order.status,
                    message: customer_message(action).to_string(),
                    timestamp: Utc::now(),
                };
                match serde_json::to_value(&notification) {
                    Ok(message) => self.queue.send(ORDER_NOTIFICATIONS, message).await,
                    Err(e) => tracing::warn!(error = %e, "could not encode order notification"),
                }
            }
            OrderAction::Cancel => {
                stock_restored = self
                    .restore_stock(order.product_id, transition.stock_to_restore, &order.username)
                    .await?;
            }
        }

        Ok(ProcessOrderResponse {
            order_id: order.id,
            previous_status: transition.from,
            status: transition.to,
            stock_restored,
            message: "Order processed successfully".to_string(),
        })
    }

    async fn restore_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
        updated_by: &str,
    ) -> Result<u32, FunctionsError> {
        let change = match self.store.restock(product_id, quantity).await {
            Ok(change) => change,
            Err(StoreError::NotFound { .. }) => {
                tracing::warn!(%product_id, quantity, "product gone, stock not restored");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        self.store
            .record_stock_movement(&StockMovement::new(
                product_id,
                change.previous,
                change.current,
                StockReason::Cancellation,
                updated_by,
            ))
            .await?;

        metrics::counter!("stock_updates_total", "reason" => StockReason::Cancellation.kind())
            .increment(1);
        Ok(quantity)
    }

    #[tracing::instrument(skip(self))]
    pub async fn status(&self, order_id: OrderId) -> Result<OrderStatusResponse, FunctionsError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(FunctionsError::OrderNotFound(order_id))?;

        Ok(OrderStatusResponse {
            order_id: order.id,
            status: order.status,
            order_date: order.order_date,
            total_price: order.total_price,
        })
    }
}
