//! Request and response bodies of the functions API.
//!
//! Shared with HTTP clients, so every type derives both serde traits.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, ProductId};
use domain::{OrderAction, OrderStatus, StockMovement};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOrderRequest {
    pub order_id: OrderId,
    pub action: OrderAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOrderResponse {
    pub order_id: OrderId,
    pub previous_status: OrderStatus,
    pub status: OrderStatus,
    /// Units put back into stock by a cancellation.
    pub stock_restored: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub total_price: Money,
}

/// Message published on the `order-notifications` queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNotification {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStockRequest {
    pub product_id: ProductId,
    pub new_stock: u32,
    pub updated_by: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdateResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub previous_stock: u32,
    pub new_stock: u32,
}

/// Message published on the `stock-updates` queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdateNotification {
    pub product_id: ProductId,
    pub product_name: String,
    pub previous_stock: u32,
    pub new_stock: u32,
    pub updated_by: String,
    pub update_date: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockProduct {
    pub product_id: ProductId,
    pub product_name: String,
    pub current_stock: u32,
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockResponse {
    pub threshold: u32,
    pub count: usize,
    pub products: Vec<LowStockProduct>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockHistoryResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub current_stock: u32,
    pub last_updated: DateTime<Utc>,
    /// Newest first.
    pub movements: Vec<StockMovement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_name: String,
    pub file_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}
