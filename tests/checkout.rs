//! Tests for the order, checkout, and refund endpoints.
//!
//! Note: these cover validation paths that run before any payment provider
//! API call. Full checkout/refund flow testing would require HTTP mocking;
//! the provider-side state transitions are exercised via the webhook tests
//! instead.

use axum::{body::Body, http::Request};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::*;

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> axum::http::Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_json(response: axum::http::Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).expect("Response should be valid JSON")
}

#[tokio::test]
async fn create_order_converts_major_units_once() {
    let db = TestDb::new();
    let app = app(db.state());

    let response = post_json(&app, "/orders", json!({ "total": "49.99", "currency": "USD" })).await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let order = body_json(response).await;
    assert_eq!(order["total_minor"], 4999);
    assert_eq!(order["currency"], "usd");
    assert_eq!(order["status"], "pending");
}

#[tokio::test]
async fn create_order_rejects_malformed_amount() {
    let db = TestDb::new();
    let app = app(db.state());

    for total in ["49.999", "", "-5.00", "12,50"] {
        let response = post_json(&app, "/orders", json!({ "total": total, "currency": "usd" })).await;
        assert_eq!(
            response.status(),
            axum::http::StatusCode::BAD_REQUEST,
            "amount {:?} should be rejected",
            total
        );
    }
}

#[tokio::test]
async fn create_order_rejects_bad_currency() {
    let db = TestDb::new();
    let app = app(db.state());

    let response = post_json(&app, "/orders", json!({ "total": "10.00", "currency": "usdollar" })).await;
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_order_returns_audit_trail() {
    let db = TestDb::new();
    let app = app(db.state());

    let order = {
        let conn = db.pool.get().unwrap();
        let order = create_test_order(&conn);
        queries::append_order_note(&conn, order.id, "Customer initiated Stripe payment.").unwrap();
        order
    };

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{}", order.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let detail = body_json(response).await;
    assert_eq!(detail["id"], order.id);
    assert_eq!(detail["notes"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn get_missing_order_returns_404() {
    let db = TestDb::new();
    let app = app(db.state());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/orders/9999").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkout_for_missing_order_returns_404() {
    let db = TestDb::new();
    let app = app(db.state());

    let response = post_json(&app, "/checkout", json!({ "order_id": 9999 })).await;
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn checkout_rejects_non_pending_order() {
    let db = TestDb::new();
    let app = app(db.state());

    let order = {
        let conn = db.pool.get().unwrap();
        let order = create_test_order(&conn);
        queries::try_mark_paid(&conn, order.id, Some("pi_1")).unwrap();
        order
    };

    let response = post_json(&app, "/checkout", json!({ "order_id": order.id })).await;
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);

    let error = body_json(response).await;
    let details = error["details"].as_str().unwrap_or("");
    assert!(details.contains("paid"), "details should name the status, got: {}", details);
}

#[tokio::test]
async fn refund_for_missing_order_returns_404() {
    let db = TestDb::new();
    let app = app(db.state());

    let response = post_json(
        &app,
        "/refund",
        json!({ "order_id": 9999, "amount": "10.00", "reason": "damaged goods" }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn refund_requires_a_payment_reference() {
    let db = TestDb::new();
    let app = app(db.state());

    // Pending order: nothing was ever charged, so there is nothing to refund
    let order = {
        let conn = db.pool.get().unwrap();
        create_test_order(&conn)
    };

    let response = post_json(
        &app,
        "/refund",
        json!({ "order_id": order.id, "amount": "10.00", "reason": "test" }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);

    let error = body_json(response).await;
    let details = error["details"].as_str().unwrap_or("");
    assert!(
        details.contains("Payment Intent"),
        "details should mention the missing payment reference, got: {}",
        details
    );
}

#[tokio::test]
async fn refund_rejects_zero_and_malformed_amounts() {
    let db = TestDb::new();
    let app = app(db.state());

    let order = {
        let conn = db.pool.get().unwrap();
        let order = create_test_order(&conn);
        queries::try_mark_paid(&conn, order.id, Some("pi_1")).unwrap();
        order
    };

    for amount in ["0.00", "1.234", "nope"] {
        let response = post_json(
            &app,
            "/refund",
            json!({ "order_id": order.id, "amount": amount }),
        )
        .await;
        assert_eq!(
            response.status(),
            axum::http::StatusCode::BAD_REQUEST,
            "amount {:?} should be rejected",
            amount
        );
    }
}
