use serde::{Deserialize, Serialize};

/// Order lifecycle status, mutated only by the webhook dispatcher.
///
/// Valid transitions: pending -> paid, pending|paid -> refunded,
/// pending -> failed. A retried checkout after failure is a new order,
/// not a transition out of `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "failed" => Some(OrderStatus::Failed),
            "refunded" => Some(OrderStatus::Refunded),
            _ => None,
        }
    }
}

/// An order as stored. Provider webhooks correlate back to it through the
/// numeric id carried in checkout session metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: i64,
    /// Total in minor currency units (cents)
    pub total_minor: i64,
    /// Lowercase ISO currency code
    pub currency: String,
    pub status: OrderStatus,
    /// Hosted checkout session id (cs_xxx), set at checkout initiation
    pub checkout_session_id: Option<String>,
    /// Provider payment reference (pi_xxx), set when the order is paid
    pub payment_intent_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrder {
    /// Major-unit decimal amount, e.g. "49.99"
    pub total: String,
    pub currency: String,
}

/// One entry of an order's append-only audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct OrderNote {
    pub id: i64,
    pub order_id: i64,
    pub note: String,
    pub created_at: i64,
}
