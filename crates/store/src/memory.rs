use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{CustomerId, OrderId, ProductId, UserId};
use domain::{Cart, CartLine, Customer, Order, OrderStatus, Product, StockMovement, User};
use tokio::sync::RwLock;

use crate::{Result, StockChange, Store, StoreCounts, StoreError};

#[derive(Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    customers: HashMap<CustomerId, Customer>,
    users: HashMap<UserId, User>,
    orders: HashMap<OrderId, Order>,
    cart_lines: HashMap<(UserId, ProductId), CartLine>,
    movements: Vec<StockMovement>,
}

/// In-memory store implementation for tests and database-less runs.
///
/// Provides the same behaviour as the PostgreSQL implementation, including
/// the uniqueness rules on usernames and emails.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn product_mut(&mut self, id: ProductId) -> Result<&mut Product> {
        self.products
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Product", id))
    }
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
}

#[async_trait]
impl Store for InMemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        let mut products: Vec<_> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, Product>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.products.get(id))
            .map(|p| (p.id, p.clone()))
            .collect())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.products.contains_key(&product.id) {
            return Err(StoreError::Conflict(format!(
                "Product {} already exists",
                product.id
            )));
        }
        tables.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut tables = self.tables.write().await;
        let existing = tables.product_mut(product.id)?;
        existing.name = product.name.clone();
        existing.description = product.description.clone();
        existing.price = product.price;
        existing.updated_at = product.updated_at;
        Ok(())
    }

    async fn withdraw_stock(&self, id: ProductId, quantity: u32) -> Result<Option<StockChange>> {
        let mut tables = self.tables.write().await;
        let product = tables.product_mut(id)?;
        let previous = product.stock_available;
        if previous < quantity {
            return Ok(None);
        }
        product.set_stock(previous - quantity);
        Ok(Some(StockChange {
            previous,
            current: product.stock_available,
        }))
    }

    async fn restock(&self, id: ProductId, quantity: u32) -> Result<StockChange> {
        let mut tables = self.tables.write().await;
        let product = tables.product_mut(id)?;
        let previous = product.stock_available;
        product.restock(quantity);
        Ok(StockChange {
            previous,
            current: product.stock_available,
        })
    }

    async fn set_stock(&self, id: ProductId, new_stock: u32) -> Result<StockChange> {
        let mut tables = self.tables.write().await;
        let previous = tables.product_mut(id)?.set_stock(new_stock);
        Ok(StockChange {
            previous,
            current: new_stock,
        })
    }

    async fn set_product_image(&self, id: ProductId, image_url: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let product = tables.product_mut(id)?;
        product.image_url = Some(image_url.to_string());
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        Ok(self.tables.write().await.products.remove(&id).is_some())
    }

    async fn low_stock_products(&self, threshold: u32) -> Result<Vec<Product>> {
        let tables = self.tables.read().await;
        let mut products: Vec<_> = tables
            .products
            .values()
            .filter(|p| p.stock_available <= threshold)
            .cloned()
            .collect();
        products.sort_by(|a, b| {
            a.stock_available
                .cmp(&b.stock_available)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(products)
    }

    async fn list_customers(&self) -> Result<Vec<Customer>> {
        let tables = self.tables.read().await;
        let mut customers: Vec<_> = tables.customers.values().cloned().collect();
        customers.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(customers)
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.tables.read().await.customers.get(&id).cloned())
    }

    async fn get_customer_by_username(&self, username: &str) -> Result<Option<Customer>> {
        let tables = self.tables.read().await;
        Ok(tables
            .customers
            .values()
            .find(|c| c.username == username)
            .cloned())
    }

    async fn customer_email_exists(&self, email: &str) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables.customers.values().any(|c| c.email == email))
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .customers
            .values()
            .find(|c| c.username == customer.username || c.email == customer.email)
        {
            let field = if existing.username == customer.username {
                "Username"
            } else {
                "Email"
            };
            return Err(StoreError::Conflict(format!("{field} is already registered")));
        }
        tables.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(
                "Username is already registered".to_string(),
            ));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables.orders.values().cloned().collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn list_orders_for_username(&self, username: &str) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| o.is_owned_by(username))
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!(
                "Order {} already exists",
                order.id
            )));
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.orders.get_mut(&order.id) {
            Some(existing) => {
                *existing = order.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("Order", order.id)),
        }
    }

    async fn transition_order(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Order", id))?;
        if order.status != from {
            return Err(StoreError::Conflict(format!(
                "Order {id} is {} now, not {from}",
                order.status
            )));
        }
        order.status = to;
        Ok(())
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool> {
        Ok(self.tables.write().await.orders.remove(&id).is_some())
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Cart> {
        let tables = self.tables.read().await;
        let lines = tables
            .cart_lines
            .values()
            .filter(|line| line.user_id == user_id)
            .cloned();
        Ok(Cart::from_lines(user_id, lines))
    }

    async fn upsert_cart_line(&self, line: &CartLine) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .cart_lines
            .entry((line.user_id, line.product_id))
            .and_modify(|existing| existing.quantity = line.quantity)
            .or_insert_with(|| line.clone());
        Ok(())
    }

    async fn delete_cart_line(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.cart_lines.remove(&(user_id, product_id)).is_some())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.cart_lines.retain(|(owner, _), _| *owner != user_id);
        Ok(())
    }

    async fn record_stock_movement(&self, movement: &StockMovement) -> Result<()> {
        self.tables.write().await.movements.push(movement.clone());
        Ok(())
    }

    async fn stock_movements(&self, product_id: ProductId) -> Result<Vec<StockMovement>> {
        let tables = self.tables.read().await;
        // Appended in time order, so reversing gives newest first.
        Ok(tables
            .movements
            .iter()
            .rev()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let tables = self.tables.read().await;
        Ok(StoreCounts {
            products: tables.products.len() as u64,
            customers: tables.customers.len() as u64,
            orders: tables.orders.len() as u64,
        })
    }
}
