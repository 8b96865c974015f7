//! Back-office endpoints: inventory management, order history and audit logs.

mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use common::{decimal, TestApp, AMERICANO, SIZE_12OZ};

fn new_cup(size: &str, stock: i32) -> Value {
    json!({
        "name": "Cup",
        "category": "Packaging",
        "size": size,
        "unit": "Ounce",
        "current_stock": stock,
        "cost_price": "3.00"
    })
}

#[tokio::test]
async fn admin_creates_item_with_initial_history() {
    let app = TestApp::new().await;

    let (status, body) = app
        .as_admin(Method::POST, "/api/v1/inventory", Some(new_cup("22", 40)))
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    let item = &body["data"];
    assert_eq!(item["label"], "Cup 22oz");
    assert_eq!(item["current_stock"], 40);
    assert_eq!(item["status"], "active");
    assert_eq!(decimal(&item["total_value"]), dec!(120));

    let id = item["id"].as_i64().unwrap();
    let (status, body) = app
        .as_admin(Method::GET, &format!("/api/v1/inventory/{id}/history"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["change_type"], "initial");
    assert_eq!(history[0]["previous_stock"], 0);
    assert_eq!(history[0]["new_stock"], 40);
    assert_eq!(history[0]["created_by"], common::ADMIN_ID);
}

#[tokio::test]
async fn duplicate_item_conflicts() {
    let app = TestApp::new().await;
    app.seed_cup("12", 5).await;

    let mut body = new_cup("12", 10);
    body["cost_price"] = json!("2.50");
    let (status, body) = app
        .as_admin(Method::POST, "/api/v1/inventory", Some(body))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_kind"], "conflict");
}

#[tokio::test]
async fn cashiers_cannot_manage_inventory() {
    let app = TestApp::new().await;
    let cup = app.seed_cup("12", 5).await;

    let (status, _) = app
        .as_cashier(Method::POST, "/api/v1/inventory", Some(new_cup("22", 1)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .as_cashier(
            Method::PATCH,
            &format!("/api/v1/inventory/{}", cup.id),
            Some(json!({ "current_stock": 100 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.stock_of(cup.id).await, 5);

    // Reads stay open to cashiers
    let (status, _) = app
        .as_cashier(Method::GET, &format!("/api/v1/inventory/{}", cup.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn adjustment_sets_absolute_stock_and_recomputes_value() {
    let app = TestApp::new().await;
    let cup = app.seed_cup("12", 5).await;

    let (status, body) = app
        .as_admin(
            Method::PATCH,
            &format!("/api/v1/inventory/{}", cup.id),
            Some(json!({ "current_stock": 30, "cost_price": "2.00", "reason": "Delivery" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["current_stock"], 30);
    assert_eq!(decimal(&body["data"]["total_value"]), dec!(60));

    let (_, body) = app
        .as_admin(
            Method::GET,
            &format!("/api/v1/inventory/{}/history", cup.id),
            None,
        )
        .await;
    let history = body["data"].as_array().unwrap();
    assert_eq!(history[0]["change_type"], "adjustment");
    assert_eq!(history[0]["previous_stock"], 5);
    assert_eq!(history[0]["new_stock"], 30);
    assert_eq!(history[0]["change_amount"], 25);
    assert_eq!(history[0]["reason"], "Delivery");

    // Cost-only change keeps stock and records no movement
    let (status, body) = app
        .as_admin(
            Method::PATCH,
            &format!("/api/v1/inventory/{}", cup.id),
            Some(json!({ "cost_price": "1.50" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["data"]["total_value"]), dec!(45));

    let (_, body) = app
        .as_admin(
            Method::GET,
            &format!("/api/v1/inventory/{}/history", cup.id),
            None,
        )
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_adjustments_are_rejected() {
    let app = TestApp::new().await;
    let cup = app.seed_cup("12", 5).await;

    let (status, _) = app
        .as_admin(
            Method::PATCH,
            &format!("/api/v1/inventory/{}", cup.id),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .as_admin(
            Method::PATCH,
            &format!("/api/v1/inventory/{}", cup.id),
            Some(json!({ "current_stock": -1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .as_admin(
            Method::PATCH,
            "/api/v1/inventory/9999",
            Some(json!({ "current_stock": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_kind"], "not_found");

    assert_eq!(app.stock_of(cup.id).await, 5);
}

#[tokio::test]
async fn low_stock_filter_lists_items_at_or_below_threshold() {
    let app = TestApp::new().await;
    app.seed_cup("8", 3).await;
    app.seed_cup("12", 10).await;
    app.seed_cup("16", 50).await;

    let (status, body) = app
        .as_cashier(Method::GET, "/api/v1/inventory?low_stock_threshold=10", None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let page = &body["data"];
    assert_eq!(page["total"], 2);
    let sizes: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["size"].as_str().unwrap())
        .collect();
    assert_eq!(sizes, vec!["12", "8"]);

    let (_, body) = app
        .as_cashier(Method::GET, "/api/v1/inventory?page=2&limit=2", None)
        .await;
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn audit_log_is_admin_only_and_records_checkouts() {
    let app = TestApp::new().await;
    app.seed_cup("12", 5).await;

    let (status, _) = app
        .as_cashier(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({
                "cart": [{ "productID": AMERICANO, "sizeID": SIZE_12OZ, "quantity": 1 }],
                "paymentMethod": "card"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.as_cashier(Method::GET, "/api/v1/audit-logs", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The audit write runs in the background
    let mut entries = Vec::new();
    for _ in 0..100 {
        let (status, body) = app
            .as_admin(Method::GET, "/api/v1/audit-logs?action=order_completed", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        entries = body["data"]["items"].as_array().cloned().unwrap_or_default();
        if !entries.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "order_completed");
    assert_eq!(entries[0]["user_id"], common::CASHIER_ID);
    assert_eq!(entries[0]["user_agent"], "till-test/1.0");
}

#[tokio::test]
async fn order_and_transaction_lists_page_newest_first() {
    let app = TestApp::new().await;
    app.seed_cup("12", 10).await;

    for quantity in 1..=3 {
        let (status, _) = app
            .as_cashier(
                Method::POST,
                "/api/v1/checkout",
                Some(json!({
                    "cart": [{ "productID": AMERICANO, "sizeID": SIZE_12OZ, "quantity": quantity }],
                    "paymentMethod": "card"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app
        .as_cashier(Method::GET, "/api/v1/orders?limit=2", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);

    let (_, body) = app
        .as_cashier(Method::GET, "/api/v1/orders?status=completed", None)
        .await;
    assert_eq!(body["data"]["total"], 3);

    let (status, _) = app
        .as_cashier(Method::GET, "/api/v1/orders?status=shipped", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .as_cashier(Method::GET, "/api/v1/transactions", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    let summary = &body["data"]["items"][0]["order_summary"];
    assert!(summary.is_array(), "{summary}");
}
