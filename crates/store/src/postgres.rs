use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::{CustomerId, Money, OrderId, ProductId, UserId};
use domain::{Cart, CartLine, Customer, Order, OrderStatus, Product, StockMovement, User};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{Result, StockChange, Store, StoreCounts, StoreError};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price_cents, stock_available, image_url, updated_at";
const CUSTOMER_COLUMNS: &str = "id, name, surname, username, email, shipping_address";
const ORDER_COLUMNS: &str = "id, customer_id, username, product_id, product_name, order_date, quantity, unit_price_cents, total_price_cents, status";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and applies pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.run_migrations().await?;
        tracing::info!("database migrations applied");
        Ok(store)
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    async fn exists(&self, table: &str, id: Uuid) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar(&format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)"))
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    fn row_to_stock_change(row: PgRow) -> Result<StockChange> {
        Ok(StockChange {
            previous: to_u32(row.try_get("previous_stock")?)?,
            current: to_u32(row.try_get("stock_available")?)?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock_available: to_u32(row.try_get("stock_available")?)?,
            image_url: row.try_get("image_url")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_customer(row: PgRow) -> Result<Customer> {
        Ok(Customer {
            id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            surname: row.try_get("surname")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            shipping_address: row.try_get("shipping_address")?,
        })
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        let role: String = row.try_get("role")?;
        Ok(User {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            role: role.parse().map_err(decode_error)?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
            username: row.try_get("username")?,
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            order_date: row.try_get("order_date")?,
            quantity: to_u32(row.try_get("quantity")?)?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            total_price: Money::from_cents(row.try_get("total_price_cents")?),
            status: status.parse().map_err(decode_error)?,
        })
    }

    fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
        Ok(CartLine {
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: to_u32(row.try_get("quantity")?)?,
            added_at: row.try_get("added_at")?,
        })
    }

    fn row_to_movement(row: PgRow) -> Result<StockMovement> {
        let reason: serde_json::Value = row.try_get("reason")?;
        Ok(StockMovement {
            id: row.try_get("id")?,
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            previous_stock: to_u32(row.try_get("previous_stock")?)?,
            new_stock: to_u32(row.try_get("new_stock")?)?,
            reason: serde_json::from_value(reason)?,
            updated_by: row.try_get("updated_by")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

fn decode_error(e: impl std::error::Error + Send + Sync + 'static) -> StoreError {
    StoreError::Database(sqlx::Error::Decode(Box::new(e)))
}

fn to_u32(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(decode_error)
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|e| StoreError::Database(sqlx::Error::Encode(Box::new(e))))
}

/// Maps unique constraint violations to `Conflict`.
fn conflict_or_database(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        let field = match db_err.constraint() {
            Some("unique_user_username" | "unique_customer_username") => Some("Username"),
            Some("unique_customer_email") => Some("Email"),
            _ if db_err.is_unique_violation() => Some("Record"),
            _ => None,
        };
        if let Some(field) = field {
            return StoreError::Conflict(format!("{field} is already registered"));
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl Store for PostgresStore {
    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, Product>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Self::row_to_product(row).map(|p| (p.id, p)))
            .collect()
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, stock_available, image_url, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(to_i32(product.stock_available)?)
        .bind(&product.image_url)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_or_database)?;

        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, price_cents = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", product.id));
        }
        Ok(())
    }

    async fn withdraw_stock(&self, id: ProductId, quantity: u32) -> Result<Option<StockChange>> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET stock_available = stock_available - $2, updated_at = $3
            WHERE id = $1 AND stock_available >= $2
            RETURNING stock_available + $2 AS previous_stock, stock_available
            "#,
        )
        .bind(id.as_uuid())
        .bind(to_i32(quantity)?)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_stock_change(row).map(Some),
            None if self.exists("products", id.as_uuid()).await? => Ok(None),
            None => Err(StoreError::not_found("Product", id)),
        }
    }

    async fn restock(&self, id: ProductId, quantity: u32) -> Result<StockChange> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET stock_available = stock_available + $2, updated_at = $3
            WHERE id = $1
            RETURNING stock_available - $2 AS previous_stock, stock_available
            "#,
        )
        .bind(id.as_uuid())
        .bind(to_i32(quantity)?)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_stock_change)
            .transpose()?
            .ok_or_else(|| StoreError::not_found("Product", id))
    }

    async fn set_stock(&self, id: ProductId, new_stock: u32) -> Result<StockChange> {
        // The locking subquery hands back the level being replaced.
        let row = sqlx::query(
            r#"
            UPDATE products AS p
            SET stock_available = $2, updated_at = $3
            FROM (SELECT id, stock_available FROM products WHERE id = $1 FOR UPDATE) AS old
            WHERE p.id = old.id
            RETURNING old.stock_available AS previous_stock, p.stock_available
            "#,
        )
        .bind(id.as_uuid())
        .bind(to_i32(new_stock)?)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_stock_change)
            .transpose()?
            .ok_or_else(|| StoreError::not_found("Product", id))
    }

    async fn set_product_image(&self, id: ProductId, image_url: &str) -> Result<()> {
        let result = sqlx::query("UPDATE products SET image_url = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(image_url)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Product", id));
        }
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn low_stock_products(&self, threshold: u32) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE stock_available <= $1 ORDER BY stock_available ASC, name ASC"
        ))
        .bind(i64::from(threshold))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn list_customers(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY username ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_customer).collect()
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_customer).transpose()
    }

    async fn get_customer_by_username(&self, username: &str) -> Result<Option<Customer>> {
        let row = sqlx::query(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_customer).transpose()
    }

    async fn customer_email_exists(&self, email: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM customers WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, surname, username, email, shipping_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(&customer.name)
        .bind(&customer.surname)
        .bind(&customer.username)
        .bind(&customer.email)
        .bind(&customer.shipping_address)
        .execute(&self.pool)
        .await
        .map_err(conflict_or_database)?;

        Ok(())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, role FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query("INSERT INTO users (id, username, password_hash, role) VALUES ($1, $2, $3, $4)")
            .bind(user.id.as_uuid())
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .execute(&self.pool)
            .await
            .map_err(conflict_or_database)?;

        Ok(())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY order_date DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn list_orders_for_username(&self, username: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE username = $1 ORDER BY order_date DESC"
        ))
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, username, product_id, product_name, order_date,
                                quantity, unit_price_cents, total_price_cents, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(&order.username)
        .bind(order.product_id.as_uuid())
        .bind(&order.product_name)
        .bind(order.order_date)
        .bind(to_i32(order.quantity)?)
        .bind(order.unit_price.cents())
        .bind(order.total_price.cents())
        .bind(order.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(conflict_or_database)?;

        Ok(())
    }

    async fn update_order(&self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET customer_id = $2, username = $3, product_id = $4, product_name = $5,
                order_date = $6, quantity = $7, unit_price_cents = $8,
                total_price_cents = $9, status = $10
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .bind(&order.username)
        .bind(order.product_id.as_uuid())
        .bind(&order.product_name)
        .bind(order.order_date)
        .bind(to_i32(order.quantity)?)
        .bind(order.unit_price.cents())
        .bind(order.total_price.cents())
        .bind(order.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Order", order.id));
        }
        Ok(())
    }

    async fn transition_order(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id.as_uuid())
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            if self.exists("orders", id.as_uuid()).await? {
                return Err(StoreError::Conflict(format!("Order {id} is no longer {from}")));
            }
            return Err(StoreError::not_found("Order", id));
        }
        Ok(())
    }

    async fn delete_order(&self, id: OrderId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Cart> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, product_id, quantity, added_at
            FROM cart_lines
            WHERE user_id = $1
            ORDER BY added_at ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let lines = rows
            .into_iter()
            .map(Self::row_to_cart_line)
            .collect::<Result<Vec<_>>>()?;
        Ok(Cart::from_lines(user_id, lines))
    }

    async fn upsert_cart_line(&self, line: &CartLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_lines (user_id, product_id, quantity, added_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(line.user_id.as_uuid())
        .bind(line.product_id.as_uuid())
        .bind(to_i32(line.quantity)?)
        .bind(line.added_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_cart_line(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM cart_lines WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_stock_movement(&self, movement: &StockMovement) -> Result<()> {
        let reason = serde_json::to_value(&movement.reason)?;

        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, product_id, previous_stock, new_stock, reason, updated_by, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(movement.id)
        .bind(movement.product_id.as_uuid())
        .bind(to_i32(movement.previous_stock)?)
        .bind(to_i32(movement.new_stock)?)
        .bind(reason)
        .bind(&movement.updated_by)
        .bind(movement.recorded_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn stock_movements(&self, product_id: ProductId) -> Result<Vec<StockMovement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, previous_stock, new_stock, reason, updated_by, recorded_at
            FROM stock_movements
            WHERE product_id = $1
            ORDER BY recorded_at DESC
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_movement).collect()
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM products) AS products,
                (SELECT COUNT(*) FROM customers) AS customers,
                (SELECT COUNT(*) FROM orders) AS orders
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let count = |column: &str| -> Result<u64> {
            let value: i64 = row.try_get(column)?;
            u64::try_from(value).map_err(decode_error)
        };

        Ok(StoreCounts {
            products: count("products")?,
            customers: count("customers")?,
            orders: count("orders")?,
        })
    }
}
