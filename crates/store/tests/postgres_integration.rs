//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and need Docker, so they are
//! ignored by default. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{CustomerId, OrderId, ProductId, UserId};
use domain::{
    CartLine, Customer, Order, OrderAction, OrderStatus, Product, ProductDraft, Role,
    StockMovement, StockReason, User,
};
use sqlx::PgPool;
use store::{PostgresStore, StockChange, Store, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_storefront_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE products, users, customers, orders, cart_lines, stock_movements",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

fn product(name: &str, stock: u32) -> Product {
    ProductDraft {
        name: name.to_string(),
        description: format!("{name} description"),
        price_cents: 1999,
        stock_available: Some(stock),
    }
    .into_product()
    .unwrap()
}

fn customer(username: &str) -> Customer {
    Customer {
        id: CustomerId::new(),
        name: "Test".to_string(),
        surname: "User".to_string(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        shipping_address: "1 Main St".to_string(),
    }
}

mod products {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn insert_update_and_delete() {
        let store = get_test_store().await;
        let mut widget = product("Widget", 5);
        store.insert_product(&widget).await.unwrap();

        widget.name = "Widget Pro".to_string();
        widget.set_stock(12);
        store.update_product(&widget).await.unwrap();
        store
            .set_product_image(widget.id, "http://localhost/widget.jpg")
            .await
            .unwrap();

        let loaded = store.get_product(widget.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Widget Pro");
        assert_eq!(loaded.stock_available, 5);
        assert_eq!(loaded.price.cents(), 1999);
        assert_eq!(loaded.image_url.as_deref(), Some("http://localhost/widget.jpg"));

        assert!(store.delete_product(widget.id).await.unwrap());
        assert!(store.get_product(widget.id).await.unwrap().is_none());
        assert!(matches!(
            store.update_product(&widget).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.set_product_image(widget.id, "x").await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn low_stock_and_batch_lookup() {
        let store = get_test_store().await;
        let low = product("Low", 2);
        let high = product("High", 50);
        store.insert_product(&low).await.unwrap();
        store.insert_product(&high).await.unwrap();

        let found = store.low_stock_products(10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, low.id);

        let batch = store
            .get_products(&[low.id, high.id, ProductId::new()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn low_stock_includes_the_threshold() {
        let store = get_test_store().await;
        for (name, stock) in [("Eleven", 11), ("Ten", 10), ("Nine", 9), ("Empty", 0)] {
            store.insert_product(&product(name, stock)).await.unwrap();
        }

        let levels: Vec<u32> = store
            .low_stock_products(10)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.stock_available)
            .collect();
        assert_eq!(levels, [0, 9, 10]);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn guarded_stock_changes() {
        let store = get_test_store().await;
        let widget = product("Widget", 5);
        store.insert_product(&widget).await.unwrap();

        assert_eq!(
            store.withdraw_stock(widget.id, 2).await.unwrap(),
            Some(StockChange { previous: 5, current: 3 })
        );
        assert_eq!(store.withdraw_stock(widget.id, 4).await.unwrap(), None);
        assert_eq!(
            store.restock(widget.id, 4).await.unwrap(),
            StockChange { previous: 3, current: 7 }
        );
        assert_eq!(
            store.set_stock(widget.id, 1).await.unwrap(),
            StockChange { previous: 7, current: 1 }
        );

        let missing = ProductId::new();
        assert!(matches!(
            store.withdraw_stock(missing, 1).await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(store.restock(missing, 1).await, Err(StoreError::NotFound { .. })));
        assert!(matches!(store.set_stock(missing, 1).await, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires docker"]
    async fn concurrent_withdrawals_do_not_oversell() {
        let store = get_test_store().await;
        let widget = product("Widget", 5);
        store.insert_product(&widget).await.unwrap();

        let id = widget.id;
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.withdraw_stock(id, 2).await.unwrap() })
            })
            .collect();
        let mut granted = 0;
        for task in tasks {
            if task.await.unwrap().is_some() {
                granted += 1;
            }
        }

        assert_eq!(granted, 2);
        let loaded = store.get_product(id).await.unwrap().unwrap();
        assert_eq!(loaded.stock_available, 1);
    }
}

mod accounts {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn duplicates_are_conflicts() {
        let store = get_test_store().await;
        let jdoe = customer("jdoe");
        store.insert_customer(&jdoe).await.unwrap();
        assert!(store.customer_email_exists("jdoe@example.com").await.unwrap());

        let twin = Customer {
            id: CustomerId::new(),
            ..jdoe.clone()
        };
        assert!(matches!(
            store.insert_customer(&twin).await,
            Err(StoreError::Conflict(_))
        ));

        let user = User {
            id: UserId::new(),
            username: "jdoe".to_string(),
            password_hash: domain::hash_password("secret1"),
            role: Role::Admin,
        };
        store.insert_user(&user).await.unwrap();
        let loaded = store.get_user_by_username("jdoe").await.unwrap().unwrap();
        assert_eq!(loaded.role, Role::Admin);
        assert!(domain::verify_password("secret1", &loaded.password_hash));

        assert!(matches!(
            store
                .insert_user(&User {
                    id: UserId::new(),
                    ..user
                })
                .await,
            Err(StoreError::Conflict(_))
        ));
    }
}

mod orders {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn order_round_trip_and_status_update() {
        let store = get_test_store().await;
        let widget = product("Widget", 5);
        let buyer = customer("alice");

        let older = Order::place(&buyer, &widget, 1, Utc::now() - Duration::days(1))
            .unwrap()
            .order;
        let placed = Order::place(&buyer, &widget, 2, Utc::now()).unwrap();
        store.insert_order(&older).await.unwrap();
        store.insert_order(&placed.order).await.unwrap();

        let mut order = placed.order.clone();
        order.transition(OrderAction::Approve).unwrap();
        store.update_order(&order).await.unwrap();

        let mine = store.list_orders_for_username("alice").await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, order.id);
        assert_eq!(mine[0].status, OrderStatus::Processing);
        assert_eq!(mine[0].total_price.cents(), 3998);

        assert!(store.list_orders_for_username("bob").await.unwrap().is_empty());
        assert_eq!(store.counts().await.unwrap().orders, 2);
        assert!(store.delete_order(older.id).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn orders_for_username_are_newest_first() {
        let store = get_test_store().await;
        let widget = product("Widget", 10);
        let alice = customer("alice");
        let bob = customer("bob");

        let mut placed = Vec::new();
        for (buyer, days_ago) in [(&alice, 3), (&bob, 2), (&alice, 1)] {
            let order = Order::place(buyer, &widget, 1, Utc::now() - Duration::days(days_ago))
                .unwrap()
                .order;
            store.insert_order(&order).await.unwrap();
            placed.push(order);
        }

        let mine: Vec<_> = store
            .list_orders_for_username("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(mine, [placed[2].id, placed[0].id]);

        let all: Vec<_> = store.list_orders().await.unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(all, [placed[2].id, placed[1].id, placed[0].id]);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn second_cancel_of_the_same_order_conflicts() {
        let store = get_test_store().await;
        let widget = product("Widget", 5);
        let placed = Order::place(&customer("alice"), &widget, 2, Utc::now()).unwrap();
        store.insert_order(&placed.order).await.unwrap();

        store
            .transition_order(placed.order.id, OrderStatus::Submitted, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(matches!(
            store
                .transition_order(placed.order.id, OrderStatus::Submitted, OrderStatus::Cancelled)
                .await,
            Err(StoreError::Conflict(_))
        ));

        let loaded = store.get_order(placed.order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Cancelled);
        assert!(matches!(
            store
                .transition_order(
                    OrderId::new(),
                    OrderStatus::Submitted,
                    OrderStatus::Processing
                )
                .await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn counts_cover_every_table() {
        let store = get_test_store().await;
        let widget = product("Widget", 5);
        store.insert_product(&widget).await.unwrap();
        store.insert_product(&product("Gadget", 5)).await.unwrap();
        let alice = customer("alice");
        store.insert_customer(&alice).await.unwrap();
        let order = Order::place(&alice, &widget, 1, Utc::now()).unwrap().order;
        store.insert_order(&order).await.unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.products, 2);
        assert_eq!(counts.customers, 1);
        assert_eq!(counts.orders, 1);
    }
}

mod cart_and_stock {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn cart_upsert_and_clear() {
        let store = get_test_store().await;
        let user_id = UserId::new();
        let widget = product("Widget", 5);

        let mut line = CartLine {
            user_id,
            product_id: widget.id,
            quantity: 1,
            added_at: Utc::now(),
        };
        store.upsert_cart_line(&line).await.unwrap();
        line.quantity = 4;
        store.upsert_cart_line(&line).await.unwrap();

        let cart = store.get_cart(user_id).await.unwrap();
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 4);

        store.clear_cart(user_id).await.unwrap();
        assert!(store.get_cart(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn stock_movements_keep_reason() {
        let store = get_test_store().await;
        let product_id = ProductId::new();
        let movement = StockMovement::new(
            product_id,
            3,
            30,
            StockReason::Adjustment("supplier delivery".to_string()),
            "admin",
        );
        store.record_stock_movement(&movement).await.unwrap();

        let history = store.stock_movements(product_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, movement.reason);
        assert_eq!(history[0].delta(), 27);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn stock_movements_are_newest_first() {
        let store = get_test_store().await;
        let product_id = ProductId::new();
        let mut older = StockMovement::new(product_id, 10, 8, StockReason::Checkout, "alice");
        older.recorded_at = Utc::now() - Duration::hours(1);
        let newer = StockMovement::new(product_id, 8, 10, StockReason::Cancellation, "alice");
        let other = StockMovement::new(ProductId::new(), 1, 0, StockReason::Checkout, "bob");

        for movement in [&newer, &other, &older] {
            store.record_stock_movement(movement).await.unwrap();
        }

        let ids: Vec<_> = store
            .stock_movements(product_id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, [newer.id, older.id]);
    }
}
