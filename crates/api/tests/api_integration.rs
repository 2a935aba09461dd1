//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::InMemoryGateway;
use common::{Money, ProductId};
use inventory::{InMemoryLedger, InventoryLedger, ProductRecord};
use metrics_exporter_prometheus::PrometheusHandle;
use store::InMemoryStore;
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

type TestState = Arc<api::AppState<InMemoryStore, InMemoryLedger, InMemoryGateway>>;

fn setup() -> (axum::Router, TestState) {
    let state = api::create_default_state();
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn seed_catalog(state: &TestState) {
    for (id, price, stock) in [("SKU-A", 10000, 10), ("SKU-B", 20000, 5)] {
        state
            .ledger
            .upsert_product(ProductRecord {
                id: ProductId::new(id),
                name: format!("Product {id}"),
                price: Money::from_minor(price),
                discount_price: None,
                stock,
                active: true,
            })
            .await
            .unwrap();
    }
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn address_json() -> serde_json::Value {
    serde_json::json!({
        "recipient": "Jane Doe",
        "phone": "010-1234-5678",
        "line1": "1 Main St",
        "line2": null,
        "city": "Seoul",
        "postal_code": "04524"
    })
}

async fn checkout_order(
    app: &axum::Router,
    state: &TestState,
    account: &str,
    lines: &[(&str, u32)],
) -> serde_json::Value {
    seed_catalog(state).await;
    let owner = format!("account:{account}");
    for (product, quantity) in lines {
        let (status, _) = send(
            app,
            "POST",
            &format!("/carts/{owner}/items"),
            Some(serde_json::json!({ "product_id": product, "quantity": quantity })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, order) = send(
        app,
        "POST",
        "/checkout",
        Some(serde_json::json!({
            "account_id": account,
            "shipping_address": address_json()
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    order
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();
    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_cart_lifecycle() {
    let (app, _) = setup();
    let owner = "session:tok-1";

    let (status, cart) = send(&app, "GET", &format!("/carts/{owner}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);

    let (status, cart) = send(
        &app,
        "POST",
        &format!("/carts/{owner}/items"),
        Some(serde_json::json!({ "product_id": "SKU-A", "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_quantity"], 2);

    // Adding the same product again increments the line.
    let (_, cart) = send(
        &app,
        "POST",
        &format!("/carts/{owner}/items"),
        Some(serde_json::json!({ "product_id": "SKU-A", "quantity": 1 })),
    )
    .await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["total_quantity"], 3);

    let (status, cart) = send(
        &app,
        "PATCH",
        &format!("/carts/{owner}/items"),
        Some(serde_json::json!({ "product_id": "SKU-A", "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["total_quantity"], 1);

    let (status, cart) = send(
        &app,
        "DELETE",
        &format!("/carts/{owner}/items/SKU-A"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_cart_merge_on_login() {
    let (app, _) = setup();
    let account = uuid::Uuid::new_v4();

    send(
        &app,
        "POST",
        "/carts/session:tok-guest/items",
        Some(serde_json::json!({ "product_id": "SKU-A", "quantity": 2 })),
    )
    .await;
    send(
        &app,
        "POST",
        &format!("/carts/account:{account}/items"),
        Some(serde_json::json!({ "product_id": "SKU-A", "quantity": 1 })),
    )
    .await;

    let (status, merged) = send(
        &app,
        "POST",
        &format!("/carts/account:{account}/merge"),
        Some(serde_json::json!({ "from": "session:tok-guest" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(merged["total_quantity"], 3);

    // The guest cart is destroyed; a fresh read creates an empty one.
    let (_, guest) = send(&app, "GET", "/carts/session:tok-guest", None).await;
    assert_eq!(guest["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_cart_flags_lines_exceeding_stock() {
    let (app, state) = setup();
    seed_catalog(&state).await;
    let owner = "session:tok-1";

    send(
        &app,
        "POST",
        &format!("/carts/{owner}/items"),
        Some(serde_json::json!({ "product_id": "SKU-A", "quantity": 2 })),
    )
    .await;
    let (_, cart) = send(
        &app,
        "POST",
        &format!("/carts/{owner}/items"),
        Some(serde_json::json!({ "product_id": "SKU-B", "quantity": 6 })),
    )
    .await;

    // Advisory only: the over-stock line is flagged, not rejected.
    let items = cart["items"].as_array().unwrap();
    assert_eq!(items[0]["in_stock"], true);
    assert_eq!(items[1]["in_stock"], false);
}

#[tokio::test]
async fn test_invalid_owner_is_rejected() {
    let (app, _) = setup();
    let (status, _) = send(&app, "GET", "/carts/visitor:tok-1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_totals_and_stock() {
    let (app, state) = setup();
    let account = uuid::Uuid::new_v4().to_string();

    let order = checkout_order(&app, &state, &account, &[("SKU-A", 2), ("SKU-B", 1)]).await;

    assert_eq!(order["total_minor"], 40000);
    assert_eq!(order["status"], "pending");
    assert!(order["order_number"].as_str().unwrap().starts_with("ORD-"));
    assert_eq!(order["items"].as_array().unwrap().len(), 2);

    assert_eq!(state.ledger.stock_of(&ProductId::new("SKU-A")).await.unwrap(), 8);
    assert_eq!(state.ledger.stock_of(&ProductId::new("SKU-B")).await.unwrap(), 4);

    // The cart was emptied by checkout.
    let (_, cart) = send(&app, "GET", &format!("/carts/account:{account}"), None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_checkout_empty_cart() {
    let (app, _) = setup();
    let account = uuid::Uuid::new_v4().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/checkout",
        Some(serde_json::json!({
            "account_id": account,
            "shipping_address": address_json()
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_checkout_insufficient_stock_names_lines() {
    let (app, state) = setup();
    seed_catalog(&state).await;
    let account = uuid::Uuid::new_v4();

    send(
        &app,
        "POST",
        &format!("/carts/account:{account}/items"),
        Some(serde_json::json!({ "product_id": "SKU-B", "quantity": 6 })),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/checkout",
        Some(serde_json::json!({
            "account_id": account.to_string(),
            "shipping_address": address_json()
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("SKU-B"));

    // Nothing was reserved.
    assert_eq!(state.ledger.stock_of(&ProductId::new("SKU-B")).await.unwrap(), 5);
}

#[tokio::test]
async fn test_pay_and_webhook_flow() {
    let (app, state) = setup();
    let account = uuid::Uuid::new_v4().to_string();
    let order = checkout_order(&app, &state, &account, &[("SKU-A", 2)]).await;
    let order_id = order["id"].as_str().unwrap();

    let (status, payment) = send(&app, "POST", &format!("/orders/{order_id}/pay"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "pending");
    let transaction_id = payment["transaction_id"].as_str().unwrap().to_string();

    let (status, payment) = send(
        &app,
        "POST",
        "/payments/webhook",
        Some(serde_json::json!({
            "transaction_id": transaction_id,
            "status": "completed",
            "amount": 20000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "completed");

    let (_, order) = send(&app, "GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(order["status"], "paid");

    // Duplicate webhook is a no-op.
    let (status, replay) = send(
        &app,
        "POST",
        "/payments/webhook",
        Some(serde_json::json!({
            "transaction_id": payment["transaction_id"],
            "status": "completed",
            "amount": 20000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replay["status"], "completed");
}

#[tokio::test]
async fn test_webhook_amount_mismatch() {
    let (app, state) = setup();
    let account = uuid::Uuid::new_v4().to_string();
    let order = checkout_order(&app, &state, &account, &[("SKU-A", 2)]).await;
    let order_id = order["id"].as_str().unwrap();

    let (_, payment) = send(&app, "POST", &format!("/orders/{order_id}/pay"), None).await;

    let (status, body) = send(
        &app,
        "POST",
        "/payments/webhook",
        Some(serde_json::json!({
            "transaction_id": payment["transaction_id"],
            "status": "completed",
            "amount": 19999
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("mismatch"));

    // The order is still payable state-wise but the payment failed.
    let (_, order) = send(&app, "GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(order["status"], "pending");
}

#[tokio::test]
async fn test_ship_before_payment_conflicts() {
    let (app, state) = setup();
    let account = uuid::Uuid::new_v4().to_string();
    let order = checkout_order(&app, &state, &account, &[("SKU-A", 1)]).await;
    let order_id = order["id"].as_str().unwrap();

    let (status, body) = send(&app, "POST", &format!("/orders/{order_id}/ship"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("pending"));
}

#[tokio::test]
async fn test_full_lifecycle_to_delivered() {
    let (app, state) = setup();
    let account = uuid::Uuid::new_v4().to_string();
    let order = checkout_order(&app, &state, &account, &[("SKU-A", 1)]).await;
    let order_id = order["id"].as_str().unwrap();

    let (_, payment) = send(&app, "POST", &format!("/orders/{order_id}/pay"), None).await;
    send(
        &app,
        "POST",
        "/payments/webhook",
        Some(serde_json::json!({
            "transaction_id": payment["transaction_id"],
            "status": "completed",
            "amount": 10000
        })),
    )
    .await;

    let (status, shipped) = send(&app, "POST", &format!("/orders/{order_id}/ship"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shipped["status"], "shipped");

    let (status, delivered) =
        send(&app, "POST", &format!("/orders/{order_id}/deliver"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["status"], "delivered");
    assert_eq!(delivered["can_review"], true);
}

#[tokio::test]
async fn test_cancel_paid_order_restores_stock() {
    let (app, state) = setup();
    let account = uuid::Uuid::new_v4().to_string();
    let order = checkout_order(&app, &state, &account, &[("SKU-A", 2)]).await;
    let order_id = order["id"].as_str().unwrap();
    assert_eq!(state.ledger.stock_of(&ProductId::new("SKU-A")).await.unwrap(), 8);

    let (_, payment) = send(&app, "POST", &format!("/orders/{order_id}/pay"), None).await;
    send(
        &app,
        "POST",
        "/payments/webhook",
        Some(serde_json::json!({
            "transaction_id": payment["transaction_id"],
            "status": "completed",
            "amount": 20000
        })),
    )
    .await;

    let (status, cancelled) =
        send(&app, "POST", &format!("/orders/{order_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(state.ledger.stock_of(&ProductId::new("SKU-A")).await.unwrap(), 10);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let (app, _) = setup();
    let fake_id = uuid::Uuid::new_v4();
    let (status, _) = send(&app, "GET", &format!("/orders/{fake_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let (app, _) = setup();
    let (status, _) = send(&app, "GET", "/orders/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_orders_for_account() {
    let (app, state) = setup();
    let account = uuid::Uuid::new_v4().to_string();
    checkout_order(&app, &state, &account, &[("SKU-A", 1)]).await;

    let (status, orders) = send(&app, "GET", &format!("/accounts/{account}/orders"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["account_id"], account);
}
