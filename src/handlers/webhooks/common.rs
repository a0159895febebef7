//! Webhook reconciliation state machine.
//!
//! Verified provider events are mapped onto order-state transitions here.
//! Each transition commits the status change and its audit note as one
//! database transaction, and reapplying the same event is a no-op. The
//! provider delivers at least once, never exactly once, so every path has
//! to tolerate retries and reordering.

use axum::http::StatusCode;
use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::error::Result;
use crate::models::{Order, OrderStatus};
use crate::util::display_amount;

/// Response type for webhook endpoints. The status code category is the
/// only retry signal the provider honors: 2xx stops redelivery, 5xx
/// triggers it, 4xx means the payload itself is unusable.
pub type WebhookResult = (StatusCode, &'static str);

/// Data extracted from a checkout completion event.
#[derive(Debug)]
pub struct PaymentCompletedData {
    pub order_id: i64,
    pub session_id: String,
    /// Payment reference recorded on the order for refund linkage
    pub payment_intent: Option<String>,
}

/// Data extracted from a refund event.
#[derive(Debug)]
pub struct ChargeRefundedData {
    pub order_id: i64,
    pub charge_id: String,
    pub amount_refunded_minor: i64,
    pub reason: Option<String>,
}

/// Data extracted from a failed payment event.
#[derive(Debug)]
pub struct PaymentFailedData {
    pub order_id: i64,
    pub payment_intent: String,
    pub message: Option<String>,
}

/// Parsed webhook event over the closed set of handled types.
#[derive(Debug)]
pub enum WebhookEvent {
    CheckoutCompleted(PaymentCompletedData),
    ChargeRefunded(ChargeRefundedData),
    PaymentFailed(PaymentFailedData),
    /// Event type not relevant to order reconciliation
    Unhandled,
}

/// Outcome of dispatching one verified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Transition applied, audit note appended
    Applied,
    /// Idempotent no-op: the event's effect is already present
    AlreadyApplied,
    /// Correlation key did not resolve to an order
    OrderNotFound,
    /// Event type outside the handled set
    Unhandled,
    /// Verified payload missing expected fields
    Malformed,
}

/// Idempotency guard: whether `event` has already taken effect on `order`.
///
/// Derived purely from observable order state (current status plus stored
/// correlation ids) - each terminal-ish state is reached by exactly one
/// event type, so no separate event-id ledger is needed.
pub fn already_applied(order: &Order, event: &WebhookEvent) -> bool {
    match event {
        WebhookEvent::CheckoutCompleted(data) => {
            order.status == OrderStatus::Paid
                && order.payment_intent_id.as_deref() == data.payment_intent.as_deref()
        }
        WebhookEvent::ChargeRefunded(_) => order.status == OrderStatus::Refunded,
        WebhookEvent::PaymentFailed(_) => order.status == OrderStatus::Failed,
        WebhookEvent::Unhandled => false,
    }
}

/// Apply one verified event to the order it correlates with.
///
/// Runs inside a BEGIN IMMEDIATE transaction: concurrent deliveries for the
/// same order serialize before the status read, and the loser re-reads
/// post-lock and lands in the idempotency no-op path.
pub fn dispatch(conn: &mut Connection, event: &WebhookEvent) -> Result<DispatchOutcome> {
    let order_id = match event {
        WebhookEvent::CheckoutCompleted(data) => data.order_id,
        WebhookEvent::ChargeRefunded(data) => data.order_id,
        WebhookEvent::PaymentFailed(data) => data.order_id,
        WebhookEvent::Unhandled => return Ok(DispatchOutcome::Unhandled),
    };

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let Some(order) = queries::get_order(&tx, order_id)? else {
        // Logged, not fatal: the provider must not retry forever against an
        // order that will never exist.
        tracing::warn!(order_id, "webhook event references an unknown order");
        return Ok(DispatchOutcome::OrderNotFound);
    };

    if already_applied(&order, event) {
        tracing::debug!(order_id, status = order.status.as_str(), "event already applied");
        return Ok(DispatchOutcome::AlreadyApplied);
    }

    let outcome = match event {
        WebhookEvent::CheckoutCompleted(data) => apply_checkout_completed(&tx, &order, data)?,
        WebhookEvent::ChargeRefunded(data) => apply_charge_refunded(&tx, &order, data)?,
        WebhookEvent::PaymentFailed(data) => apply_payment_failed(&tx, &order, data)?,
        WebhookEvent::Unhandled => DispatchOutcome::Unhandled,
    };

    // Status change and audit note commit as one unit; a dropped transaction
    // rolls both back, so the order is never half-transitioned.
    if outcome == DispatchOutcome::Applied {
        tx.commit()?;
    }

    Ok(outcome)
}

fn apply_checkout_completed(
    conn: &Connection,
    order: &Order,
    data: &PaymentCompletedData,
) -> Result<DispatchOutcome> {
    match order.status {
        OrderStatus::Paid => {
            // Same-reference replays were caught by the guard; a different
            // reference on a paid order is stale and must not re-apply.
            tracing::warn!(
                order_id = order.id,
                stored = ?order.payment_intent_id,
                event = ?data.payment_intent,
                "checkout completion for an already paid order ignored"
            );
            return Ok(DispatchOutcome::AlreadyApplied);
        }
        OrderStatus::Refunded | OrderStatus::Failed => {
            tracing::warn!(
                order_id = order.id,
                status = order.status.as_str(),
                "stale checkout completion ignored"
            );
            return Ok(DispatchOutcome::AlreadyApplied);
        }
        OrderStatus::Pending => {}
    }

    if !queries::try_mark_paid(conn, order.id, data.payment_intent.as_deref())? {
        return Ok(DispatchOutcome::AlreadyApplied);
    }

    let note = format!(
        "Stripe payment completed successfully. Payment Intent ID: {} | Amount: {}",
        data.payment_intent.as_deref().unwrap_or("none"),
        display_amount(order.total_minor, &order.currency),
    );
    queries::append_order_note(conn, order.id, &note)?;

    tracing::info!(
        order_id = order.id,
        session_id = %data.session_id,
        "order marked paid"
    );

    Ok(DispatchOutcome::Applied)
}

fn apply_charge_refunded(
    conn: &Connection,
    order: &Order,
    data: &ChargeRefundedData,
) -> Result<DispatchOutcome> {
    match order.status {
        OrderStatus::Failed => {
            // A refund can only follow a payment; against a failed order the
            // event is stale or misrouted.
            tracing::warn!(order_id = order.id, "refund event for a failed order ignored");
            return Ok(DispatchOutcome::AlreadyApplied);
        }
        OrderStatus::Refunded => return Ok(DispatchOutcome::AlreadyApplied),
        OrderStatus::Pending | OrderStatus::Paid => {}
    }

    if !queries::try_mark_refunded(conn, order.id)? {
        return Ok(DispatchOutcome::AlreadyApplied);
    }

    // Amount converted to the order's display currency for note text only.
    let note = format!(
        "Payment refunded via Stripe. Amount: {} | Refund ID: {} | Reason: {}",
        display_amount(data.amount_refunded_minor, &order.currency),
        data.charge_id,
        data.reason.as_deref().unwrap_or("Not specified"),
    );
    queries::append_order_note(conn, order.id, &note)?;

    tracing::info!(
        order_id = order.id,
        charge_id = %data.charge_id,
        "order marked refunded"
    );

    Ok(DispatchOutcome::Applied)
}

fn apply_payment_failed(
    conn: &Connection,
    order: &Order,
    data: &PaymentFailedData,
) -> Result<DispatchOutcome> {
    match order.status {
        OrderStatus::Paid => {
            // A failure notification arriving after success is stale; a paid
            // order never regresses.
            tracing::warn!(
                order_id = order.id,
                payment_intent = %data.payment_intent,
                "failure event after successful payment ignored"
            );
            return Ok(DispatchOutcome::AlreadyApplied);
        }
        OrderStatus::Refunded | OrderStatus::Failed => {
            return Ok(DispatchOutcome::AlreadyApplied);
        }
        OrderStatus::Pending => {}
    }

    if !queries::try_mark_failed(conn, order.id)? {
        return Ok(DispatchOutcome::AlreadyApplied);
    }

    let note = format!(
        "Stripe payment failed. Error: {}",
        data.message.as_deref().unwrap_or("Unknown error"),
    );
    queries::append_order_note(conn, order.id, &note)?;

    tracing::info!(
        order_id = order.id,
        payment_intent = %data.payment_intent,
        "order marked failed"
    );

    Ok(DispatchOutcome::Applied)
}
