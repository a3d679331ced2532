use std::collections::HashMap;

use async_trait::async_trait;
use common::{CustomerId, OrderId, ProductId, UserId};
use domain::{Cart, CartLine, Customer, Order, OrderStatus, Product, StockMovement, User};
use serde::Serialize;

use crate::Result;

/// Row counts shown on the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub products: u64,
    pub customers: u64,
    pub orders: u64,
}

/// A product's stock level around a single guarded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockChange {
    pub previous: u32,
    pub current: u32,
}

/// Storage for every storefront entity.
///
/// Each method is a single write or read. Stock levels and order statuses
/// are only changed through the guarded calls, which check and write in one
/// step so concurrent requests cannot overwrite each other.
#[async_trait]
pub trait Store: Send + Sync + Clone + 'static {
    // Products

    /// All products, ordered by name.
    async fn list_products(&self) -> Result<Vec<Product>>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Loads the given products, silently skipping ids that do not exist.
    async fn get_products(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, Product>>;

    async fn insert_product(&self, product: &Product) -> Result<()>;

    /// Writes a product's name, description and price. Stock and image are
    /// left as stored. Fails with `NotFound` if it does not exist.
    async fn update_product(&self, product: &Product) -> Result<()>;

    /// Takes `quantity` units out of stock if at least that many remain.
    ///
    /// Returns `None` when stock is short. Fails with `NotFound` if the
    /// product does not exist.
    async fn withdraw_stock(&self, id: ProductId, quantity: u32) -> Result<Option<StockChange>>;

    /// Adds `quantity` units to stock.
    async fn restock(&self, id: ProductId, quantity: u32) -> Result<StockChange>;

    /// Overwrites the stock level.
    async fn set_stock(&self, id: ProductId, new_stock: u32) -> Result<StockChange>;

    async fn set_product_image(&self, id: ProductId, image_url: &str) -> Result<()>;

    /// Returns whether a product was deleted.
    async fn delete_product(&self, id: ProductId) -> Result<bool>;

    /// Products with `stock_available <= threshold`, lowest stock first.
    async fn low_stock_products(&self, threshold: u32) -> Result<Vec<Product>>;

    // Customers

    async fn list_customers(&self) -> Result<Vec<Customer>>;

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>>;

    async fn get_customer_by_username(&self, username: &str) -> Result<Option<Customer>>;

    async fn customer_email_exists(&self, email: &str) -> Result<bool>;

    /// Fails with `Conflict` if the username or email is taken.
    async fn insert_customer(&self, customer: &Customer) -> Result<()>;

    // Users

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Fails with `Conflict` if the username is taken.
    async fn insert_user(&self, user: &User) -> Result<()>;

    // Orders

    /// All orders, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// Orders placed by `username`, newest first.
    async fn list_orders_for_username(&self, username: &str) -> Result<Vec<Order>>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn insert_order(&self, order: &Order) -> Result<()>;

    /// Replaces an order. Fails with `NotFound` if it does not exist.
    async fn update_order(&self, order: &Order) -> Result<()>;

    /// Moves an order to `to` only while its stored status is still `from`.
    ///
    /// Fails with `Conflict` when the status changed in the meantime.
    async fn transition_order(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<()>;

    async fn delete_order(&self, id: OrderId) -> Result<bool>;

    // Cart

    async fn get_cart(&self, user_id: UserId) -> Result<Cart>;

    /// Inserts the line or overwrites the quantity of an existing one.
    async fn upsert_cart_line(&self, line: &CartLine) -> Result<()>;

    async fn delete_cart_line(&self, user_id: UserId, product_id: ProductId) -> Result<bool>;

    async fn clear_cart(&self, user_id: UserId) -> Result<()>;

    // Stock history

    async fn record_stock_movement(&self, movement: &StockMovement) -> Result<()>;

    /// Movements for one product, newest first.
    async fn stock_movements(&self, product_id: ProductId) -> Result<Vec<StockMovement>>;

    async fn counts(&self) -> Result<StoreCounts>;
}
