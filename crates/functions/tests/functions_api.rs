//! Integration tests for the functions HTTP API.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use chrono::Utc;
use common::CustomerId;
use domain::{Customer, Order, OrderStatus, Product, ProductDraft};
use functions::AppState;
use functions::config::Config;
use functions::services::{InMemoryFileStore, InMemoryQueue, NotificationQueue, STOCK_UPDATES};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, Store};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    store: InMemoryStore,
    queue: InMemoryQueue,
}

fn setup_with_key(key: Option<&str>) -> TestApp {
    let store = InMemoryStore::new();
    let queue = InMemoryQueue::new();
    let config = Config {
        functions_key: key.map(str::to_string),
        public_base_url: "http://functions.test".to_string(),
        ..Config::default()
    };
    let state = Arc::new(AppState::new(
        store.clone(),
        Arc::new(InMemoryFileStore::new()),
        Arc::new(queue.clone()),
        &config,
    ));
    TestApp {
        app: functions::create_app(state, get_metrics_handle()),
        store,
        queue,
    }
}

fn setup() -> TestApp {
    setup_with_key(None)
}

async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

const BOUNDARY: &str = "X-STOREFRONT-BOUNDARY";

fn multipart_request(uri: &str, file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn seed_order(store: &InMemoryStore, stock: u32, quantity: u32) -> (Product, Order) {
    let product = ProductDraft {
        name: "Teapot".to_string(),
        description: String::new(),
        price_cents: 2500,
        stock_available: Some(stock),
    }
    .into_product()
    .unwrap();
    let buyer = Customer {
        id: CustomerId::new(),
        name: "Jane".to_string(),
        surname: "Doe".to_string(),
        username: "jdoe".to_string(),
        email: "jdoe@example.com".to_string(),
        shipping_address: "1 Main St".to_string(),
    };
    let placed = Order::place(&buyer, &product, quantity, Utc::now()).unwrap();
    store.insert_order(&placed.order).await.unwrap();
    store.insert_product(&placed.product).await.unwrap();
    (placed.product, placed.order)
}

#[tokio::test]
async fn test_health_check() {
    let t = setup();
    let response = t.app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

mod function_key {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_rejected() {
        let t = setup_with_key(Some("s3cret"));
        let response = t.app.oneshot(get("/api/stock/low")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_json(response).await["error"].as_str().is_some());
    }

    #[tokio::test]
    async fn matching_key_is_accepted() {
        let t = setup_with_key(Some("s3cret"));
        let request = Request::builder()
            .uri("/api/stock/low")
            .header("x-functions-key", "s3cret")
            .body(Body::empty())
            .unwrap();
        let response = t.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_is_open() {
        let t = setup_with_key(Some("s3cret"));
        let response = t.app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

mod orders {
    use super::*;

    #[tokio::test]
    async fn approve_publishes_notification() {
        let t = setup();
        let (_, order) = seed_order(&t.store, 5, 2).await;

        let response = t
            .app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/orders/process",
                serde_json::json!({"order_id": order.id, "action": "approve"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "Processing");
        assert_eq!(json["previous_status"], "Submitted");

        let response = t
            .app
            .oneshot(get("/api/queues/order-notifications/next"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let message = body_json(response).await;
        assert_eq!(message["order_id"], order.id.to_string());
        assert_eq!(message["status"], "Processing");
    }

    #[tokio::test]
    async fn cancel_restores_stock() {
        let t = setup();
        let (product, order) = seed_order(&t.store, 5, 4).await;

        let response = t
            .app
            .oneshot(json_request(
                "POST",
                "/api/orders/process",
                serde_json::json!({"order_id": order.id, "action": "cancel"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["stock_restored"], 4);

        let product = t.store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.stock_available, 5);
        let order = t.store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn illegal_transition_is_conflict() {
        let t = setup();
        let (_, order) = seed_order(&t.store, 5, 1).await;

        let response = t
            .app
            .oneshot(json_request(
                "POST",
                "/api/orders/process",
                serde_json::json!({"order_id": order.id, "action": "complete"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_action_is_bad_request() {
        let t = setup();
        let (_, order) = seed_order(&t.store, 5, 1).await;

        let response = t
            .app
            .oneshot(json_request(
                "POST",
                "/api/orders/process",
                serde_json::json!({"order_id": order.id, "action": "ship"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn status_of_missing_order_is_not_found() {
        let t = setup();
        let uri = format!("/api/orders/{}/status", uuid::Uuid::new_v4());
        let response = t.app.oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_with_malformed_id_is_bad_request() {
        let t = setup();
        let response = t.app.oneshot(get("/api/orders/not-a-uuid/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

mod stock {
    use super::*;

    #[tokio::test]
    async fn update_then_history_and_low_stock() {
        let t = setup();
        let (product, _) = seed_order(&t.store, 20, 1).await;

        let response = t
            .app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/stock/update",
                serde_json::json!({
                    "product_id": product.id,
                    "new_stock": 3,
                    "updated_by": "admin",
                    "reason": "damaged in storage"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["previous_stock"], 19);
        assert_eq!(json["new_stock"], 3);
        assert_eq!(t.queue.pending(STOCK_UPDATES).await, 1);

        let response = t
            .app
            .clone()
            .oneshot(get(&format!("/api/stock/history/{}", product.id)))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["current_stock"], 3);
        assert_eq!(json["movements"][0]["reason"]["kind"], "adjustment");

        let response = t.app.oneshot(get("/api/stock/low")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["threshold"], 10);
        assert_eq!(json["count"], 1);
        assert_eq!(json["products"][0]["current_stock"], 3);
    }

    #[tokio::test]
    async fn threshold_query_overrides_default() {
        let t = setup();
        seed_order(&t.store, 20, 1).await;
        let response = t.app.oneshot(get("/api/stock/low?threshold=50")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["threshold"], 50);
        assert_eq!(json["count"], 1);
    }
}

mod files {
    use super::*;

    #[tokio::test]
    async fn image_upload_list_download_delete() {
        let t = setup();

        let response = t
            .app
            .clone()
            .oneshot(multipart_request("/api/files/upload/image", "lamp.png", b"fake-png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let file_name = json["file_name"].as_str().unwrap().to_string();
        assert!(file_name.starts_with("image_") && file_name.ends_with(".png"));
        assert_eq!(
            json["file_url"],
            format!("http://functions.test/api/files/images/{file_name}")
        );

        let response = t.app.clone().oneshot(get("/api/files/images")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["size"], 8);

        let response = t
            .app
            .clone()
            .oneshot(get(&format!("/api/files/images/{file_name}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/png");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"fake-png");

        let response = t
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/files/images/{file_name}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(response).await["deleted"], true);

        let response = t
            .app
            .oneshot(get(&format!("/api/files/images/{file_name}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn contract_keeps_its_name() {
        let t = setup();
        let response = t
            .app
            .clone()
            .oneshot(multipart_request("/api/files/upload/contract", "supplier.pdf", b"%PDF-1.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["file_name"], "supplier.pdf");

        let response = t.app.oneshot(get("/api/files/contracts")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json[0]["name"], "supplier.pdf");
    }

    #[tokio::test]
    async fn contract_url_with_reserved_characters_downloads() {
        let t = setup();
        let response = t
            .app
            .clone()
            .oneshot(multipart_request("/api/files/upload/contract", "Q1 terms #2.pdf", b"%PDF-1.4"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let url = json["file_url"].as_str().unwrap();
        assert_eq!(url, "http://functions.test/api/files/contracts/Q1%20terms%20%232.pdf");

        let path = url.trim_start_matches("http://functions.test");
        let response = t.app.oneshot(get(path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"%PDF-1.4");
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let t = setup();
        let response = t
            .app
            .oneshot(multipart_request("/api/files/upload/contract", "empty.pdf", b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_kind_is_bad_request() {
        let t = setup();
        let response = t.app.oneshot(get("/api/files/videos/clip.mp4")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn empty_queue_returns_no_content() {
    let t = setup();
    let response = t
        .app
        .oneshot(get("/api/queues/order-notifications/next"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
