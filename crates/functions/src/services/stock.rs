//! Stock adjustments, low-stock reporting and stock history.

use std::sync::Arc;

use chrono::Utc;
use common::ProductId;
use domain::{StockMovement, StockReason};
use store::{Store, StoreError};

use super::notifications::{NotificationQueue, STOCK_UPDATES};
use crate::error::FunctionsError;
use crate::models::{
    LowStockProduct, LowStockResponse, StockHistoryResponse, StockUpdateNotification,
    StockUpdateResponse, UpdateStockRequest,
};

#[derive(Clone)]
pub struct StockManagement<S: Store> {
    store: S,
    queue: Arc<dyn NotificationQueue>,
    default_threshold: u32,
}

impl<S: Store> StockManagement<S> {
    pub fn new(store: S, queue: Arc<dyn NotificationQueue>, default_threshold: u32) -> Self {
        Self {
            store,
            queue,
            default_threshold,
        }
    }

    pub fn default_threshold(&self) -> u32 {
        self.default_threshold
    }

    /// Overwrites a product's stock level, records the adjustment and
    /// publishes it on `stock-updates`.
    #[tracing::instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn update(&self, request: UpdateStockRequest) -> Result<StockUpdateResponse, FunctionsError> {
        let product = self
            .store
            .get_product(request.product_id)
            .await?
            .ok_or(FunctionsError::ProductNotFound(request.product_id))?;

        let new_stock = request.new_stock;
        let previous_stock = match self.store.set_stock(product.id, new_stock).await {
            Ok(change) => change.previous,
            Err(StoreError::NotFound { .. }) => {
                return Err(FunctionsError::ProductNotFound(request.product_id));
            }
            Err(e) => return Err(e.into()),
        };

        let reason = StockReason::Adjustment(request.reason.clone());
        self.store
            .record_stock_movement(&StockMovement::new(
                product.id,
                previous_stock,
                new_stock,
                reason.clone(),
                request.updated_by.clone(),
            ))
            .await?;

        metrics::counter!("stock_updates_total", "reason" => reason.kind()).increment(1);
        tracing::info!(
            product = %product.name,
            previous_stock,
            new_stock,
            updated_by = %request.updated_by,
            "stock updated"
        );

        let notification = StockUpdateNotification {
            product_id: product.id,
            product_name: product.name.clone(),
            previous_stock,
            new_stock,
            updated_by: request.updated_by,
            update_date: Utc::now(),
            reason: request.reason,
        };
        match serde_json::to_value(&notification) {
            Ok(message) => self.queue.send(STOCK_UPDATES, message).await,
            Err(e) => tracing::warn!(error = %e, "could not encode stock notification"),
        }

        Ok(StockUpdateResponse {
            product_id: product.id,
            product_name: product.name,
            previous_stock,
            new_stock,
        })
    }

    /// Products at or below `threshold` units, or the configured default.
    #[tracing::instrument(skip(self))]
    pub async fn low_stock(&self, threshold: Option<u32>) -> Result<LowStockResponse, FunctionsError> {
        let threshold = threshold.unwrap_or(self.default_threshold);
        let products: Vec<LowStockProduct> = self
            .store
            .low_stock_products(threshold)
            .await?
            .into_iter()
            .map(|p| LowStockProduct {
                product_id: p.id,
                product_name: p.name,
                current_stock: p.stock_available,
                price: p.price,
            })
            .collect();

        Ok(LowStockResponse {
            threshold,
            count: products.len(),
            products,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn history(&self, product_id: ProductId) -> Result<StockHistoryResponse, FunctionsError> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or(FunctionsError::ProductNotFound(product_id))?;
        let movements = self.store.stock_movements(product_id).await?;

        Ok(StockHistoryResponse {
            product_id: product.id,
            product_name: product.name,
            current_stock: product.stock_available,
            last_updated: product.updated_at,
            movements,
        })
    }
}

#[cfg(test)]
mod tests {
    use domain::{Product, ProductDraft};
    use store::InMemoryStore;

    use super::*;
    use crate::services::notifications::InMemoryQueue;

    fn product(name: &str, stock: u32) -> Product {
        ProductDraft {
            name: name.to_string(),
            description: String::new(),
            price_cents: 500,
            stock_available: Some(stock),
        }
        .into_product()
        .unwrap()
    }

    async fn setup(products: &[&Product]) -> (StockManagement<InMemoryStore>, InMemoryStore, InMemoryQueue) {
        let store = InMemoryStore::new();
        for p in products {
            store.insert_product(p).await.unwrap();
        }
        let queue = InMemoryQueue::new();
        let stock = StockManagement::new(store.clone(), Arc::new(queue.clone()), 10);
        (stock, store, queue)
    }

    #[tokio::test]
    async fn update_sets_level_records_and_publishes() {
        let mug = product("Mug", 4);
        let (stock, store, queue) = setup(&[&mug]).await;

        let response = stock
            .update(UpdateStockRequest {
                product_id: mug.id,
                new_stock: 25,
                updated_by: "admin".to_string(),
                reason: "delivery".to_string(),
            })
            .await
            .unwrap();
        assert_eq!((response.previous_stock, response.new_stock), (4, 25));

        assert_eq!(store.get_product(mug.id).await.unwrap().unwrap().stock_available, 25);

        let history = stock.history(mug.id).await.unwrap();
        assert_eq!(history.current_stock, 25);
        assert_eq!(history.movements.len(), 1);
        assert_eq!(
            history.movements[0].reason,
            StockReason::Adjustment("delivery".to_string())
        );

        let message: StockUpdateNotification =
            serde_json::from_value(queue.receive(STOCK_UPDATES).await.unwrap()).unwrap();
        assert_eq!(message.product_name, "Mug");
        assert_eq!(message.previous_stock, 4);
        assert_eq!(message.updated_by, "admin");
    }

    #[tokio::test]
    async fn update_unknown_product_is_not_found() {
        let (stock, _, queue) = setup(&[]).await;
        let err = stock
            .update(UpdateStockRequest {
                product_id: ProductId::new(),
                new_stock: 1,
                updated_by: "admin".to_string(),
                reason: String::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FunctionsError::ProductNotFound(_)));
        assert_eq!(queue.pending(STOCK_UPDATES).await, 0);
    }

    #[tokio::test]
    async fn low_stock_uses_default_threshold() {
        let a = product("A", 10);
        let b = product("B", 11);
        let c = product("C", 2);
        let (stock, _, _) = setup(&[&a, &b, &c]).await;

        let report = stock.low_stock(None).await.unwrap();
        assert_eq!(report.threshold, 10);
        assert_eq!(report.count, 2);
        assert_eq!(report.products[0].product_name, "C");

        let report = stock.low_stock(Some(2)).await.unwrap();
        assert_eq!(report.count, 1);
    }
}
