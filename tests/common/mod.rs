//! Test utilities and fixtures for Paygate integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use rusqlite::Connection;
use serde_json::json;

pub use paygate::config::GatewaySettings;
pub use paygate::db::{create_pool, init_db, queries, AppState, DbPool};
pub use paygate::handlers;
pub use paygate::models::*;

/// Webhook secret shared by all test fixtures.
pub const WEBHOOK_SECRET: &str = "whsec_test123secret456";

pub fn test_gateway() -> GatewaySettings {
    GatewaySettings {
        test_mode: true,
        secret_key: "sk_test_xxx".to_string(),
        publishable_key: "pk_test_xxx".to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        statement_descriptor: None,
        statement_descriptor_suffix: None,
    }
}

/// Create an in-memory test database with schema initialized.
/// For single-connection tests (queries, dispatch).
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Pooled test database backed by a temp file, removed on drop.
/// Pool tests need every connection to see the same database, which a
/// plain `:memory:` manager does not provide.
pub struct TestDb {
    pub pool: DbPool,
    path: PathBuf,
}

impl TestDb {
    pub fn new() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "paygate_test_{}_{}.db",
            std::process::id(),
            n
        ));

        let pool = create_pool(path.to_str().expect("temp path is not UTF-8"))
            .expect("Failed to create test pool");
        {
            let conn = pool.get().expect("Failed to get test connection");
            init_db(&conn).expect("Failed to initialize schema");
        }

        Self { pool, path }
    }

    pub fn state(&self) -> AppState {
        AppState {
            db: self.pool.clone(),
            gateway: test_gateway(),
            base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let base = self.path.display().to_string();
        let _ = std::fs::remove_file(&self.path);
        let _ = std::fs::remove_file(format!("{}-wal", base));
        let _ = std::fs::remove_file(format!("{}-shm", base));
    }
}

/// Create a Router with all endpoints.
pub fn app(state: AppState) -> Router {
    Router::new().merge(handlers::router()).with_state(state)
}

/// Create a pending test order (4999 minor units usd unless stated).
pub fn create_test_order(conn: &Connection) -> Order {
    queries::create_order(conn, 4999, "usd").expect("Failed to create test order")
}

pub fn create_test_order_with(conn: &Connection, total_minor: i64, currency: &str) -> Order {
    queries::create_order(conn, total_minor, currency).expect("Failed to create test order")
}

// ============ Webhook payload fixtures ============

pub fn checkout_completed_body(order_id: i64, payment_intent: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_123",
                "payment_intent": payment_intent,
                "metadata": { "order_id": order_id.to_string() }
            }
        }
    }))
    .expect("Failed to serialize fixture")
}

pub fn charge_refunded_body(
    order_id: i64,
    charge_id: &str,
    amount_refunded: i64,
    reason: Option<&str>,
) -> Vec<u8> {
    let refund_entry = match reason {
        Some(r) => json!({ "id": "re_test_1", "reason": r }),
        None => json!({ "id": "re_test_1", "reason": null }),
    };
    serde_json::to_vec(&json!({
        "type": "charge.refunded",
        "data": {
            "object": {
                "id": charge_id,
                "amount_refunded": amount_refunded,
                "metadata": { "order_id": order_id.to_string() },
                "refunds": { "data": [refund_entry] }
            }
        }
    }))
    .expect("Failed to serialize fixture")
}

pub fn payment_failed_body(order_id: i64, message: Option<&str>) -> Vec<u8> {
    let error = match message {
        Some(m) => json!({ "message": m }),
        None => json!(null),
    };
    serde_json::to_vec(&json!({
        "type": "payment_intent.payment_failed",
        "data": {
            "object": {
                "id": "pi_test_failed",
                "metadata": { "order_id": order_id.to_string() },
                "last_payment_error": error
            }
        }
    }))
    .expect("Failed to serialize fixture")
}

// ============ Signature fixtures ============

pub fn compute_stripe_signature(payload: &[u8], secret: &str, timestamp: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signed_payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Current Unix timestamp as a string (for webhook signature tests).
pub fn current_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

/// A timestamp beyond the 5-minute tolerance (for replay rejection tests).
pub fn old_timestamp() -> String {
    (chrono::Utc::now().timestamp() - 600).to_string()
}

/// Full `stripe-signature` header value for a payload, signed now.
pub fn signed_header(payload: &[u8], secret: &str) -> String {
    let timestamp = current_timestamp();
    let signature = compute_stripe_signature(payload, secret, &timestamp);
    format!("t={},v1={}", timestamp, signature)
}
