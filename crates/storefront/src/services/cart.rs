//! Cart maintenance and checkout.

use std::time::Instant;

use chrono::Utc;
use common::{Money, ProductId, UserId};
use domain::{
    Cart, CartLine, CartSummary, DomainError, Order, PlacedOrder, StockMovement, StockReason,
    plan_checkout,
};
use serde::Serialize;
use store::Store;

use super::withdraw;
use crate::error::StorefrontError;

/// Orders created by a checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub orders: Vec<Order>,
    pub total: Money,
    /// Cart lines dropped because their product no longer exists.
    pub skipped: Vec<ProductId>,
}

#[derive(Clone)]
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    async fn load(&self, user_id: UserId) -> Result<Cart, StorefrontError> {
        Ok(self.store.get_cart(user_id).await?)
    }

    async fn product(&self, product_id: ProductId) -> Result<domain::Product, StorefrontError> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or(StorefrontError::ProductNotFound(product_id))
    }

    /// The cart priced against the current catalog.
    #[tracing::instrument(skip(self))]
    pub async fn summary(&self, user_id: UserId) -> Result<CartSummary, StorefrontError> {
        let cart = self.load(user_id).await?;
        let ids: Vec<ProductId> = cart.lines().iter().map(|line| line.product_id).collect();
        let products = self.store.get_products(&ids).await?;
        Ok(cart.summarize(&products)?)
    }

    /// Total units in the cart.
    pub async fn count(&self, user_id: UserId) -> Result<u32, StorefrontError> {
        Ok(self.load(user_id).await?.item_count())
    }

    #[tracing::instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartLine, StorefrontError> {
        let product = self.product(product_id).await?;
        let mut cart = self.load(user_id).await?;
        let line = cart.add(&product, quantity)?.clone();
        self.store.upsert_cart_line(&line).await?;
        tracing::debug!(product = %product.name, quantity = line.quantity, "cart line saved");
        Ok(line)
    }

    /// Sets a line's quantity. `None` means a non-positive quantity removed it.
    #[tracing::instrument(skip(self))]
    pub async fn update(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Option<CartLine>, StorefrontError> {
        let product = self.product(product_id).await?;
        let mut cart = self.load(user_id).await?;
        match cart.update_quantity(&product, quantity)? {
            Some(line) => {
                let line = line.clone();
                self.store.upsert_cart_line(&line).await?;
                Ok(Some(line))
            }
            None => {
                self.store.delete_cart_line(user_id, product_id).await?;
                Ok(None)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), StorefrontError> {
        if !self.store.delete_cart_line(user_id, product_id).await? {
            return Err(DomainError::CartLineNotFound { product_id }.into());
        }
        Ok(())
    }

    /// Turns the cart into one order per line.
    ///
    /// Stock for every line is checked before anything is written. Stock is
    /// then taken line by line with guarded decrements; if another buyer got
    /// there first, the units already taken are put back and nothing else is
    /// written. Orders are saved next, then the cart is emptied.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        username: &str,
    ) -> Result<CheckoutReceipt, StorefrontError> {
        let started = Instant::now();
        let result = self.place_orders(user_id, username).await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics::counter!("checkouts_total", "outcome" => outcome).increment(1);
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        result
    }

    async fn place_orders(
        &self,
        user_id: UserId,
        username: &str,
    ) -> Result<CheckoutReceipt, StorefrontError> {
        let customer = self
            .store
            .get_customer_by_username(username)
            .await?
            .ok_or_else(|| StorefrontError::NoCustomerProfile(username.to_string()))?;

        let cart = self.load(user_id).await?;
        let ids: Vec<ProductId> = cart.lines().iter().map(|line| line.product_id).collect();
        let products = self.store.get_products(&ids).await?;
        let plan = plan_checkout(&cart, &products, &customer, Utc::now())?;
        let total = Money::checked_sum(plan.orders.iter().map(|placed| placed.order.total_price))
            .ok_or_else(DomainError::total_too_large)?;

        let mut changes = Vec::with_capacity(plan.orders.len());
        for placed in &plan.orders {
            match withdraw(&self.store, &placed.product, placed.order.quantity).await {
                Ok(change) => changes.push(change),
                Err(e) => {
                    self.release(&plan.orders[..changes.len()]).await;
                    return Err(e);
                }
            }
        }

        for placed in &plan.orders {
            self.store.insert_order(&placed.order).await?;
        }
        for (placed, change) in plan.orders.iter().zip(&changes) {
            self.store
                .record_stock_movement(&StockMovement::new(
                    placed.product.id,
                    change.previous,
                    change.current,
                    StockReason::Checkout,
                    username,
                ))
                .await?;
        }
        self.store.clear_cart(user_id).await?;

        if !plan.skipped.is_empty() {
            tracing::warn!(skipped = plan.skipped.len(), "cart lines for removed products were dropped");
        }
        metrics::counter!("orders_placed_total", "source" => "checkout")
            .increment(plan.orders.len() as u64);

        let orders: Vec<Order> = plan.orders.into_iter().map(|placed| placed.order).collect();
        tracing::info!(orders = orders.len(), %total, "checkout completed");

        Ok(CheckoutReceipt {
            orders,
            total,
            skipped: plan.skipped,
        })
    }

    /// Puts back stock taken for a checkout that could not complete.
    async fn release(&self, taken: &[PlacedOrder]) {
        for placed in taken {
            let product_id = placed.product.id;
            if let Err(e) = self.store.restock(product_id, placed.order.quantity).await {
                tracing::error!(%product_id, error = %e, "could not return reserved stock");
            }
        }
    }
}
