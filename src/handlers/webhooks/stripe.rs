use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::db::AppState;
use crate::payments::{
    StripeCharge, StripeCheckoutSessionObject, StripeClient, StripePaymentIntent,
    StripeWebhookEvent, VerificationError,
};

use super::common::{
    dispatch, ChargeRefundedData, DispatchOutcome, PaymentCompletedData, PaymentFailedData,
    WebhookEvent, WebhookResult,
};

/// Axum handler for Stripe webhook deliveries.
///
/// The body is attacker-controlled bytes until the signature check passes:
/// nothing is parsed and no order is looked up before verification.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    let signature = match extract_signature(&headers) {
        Ok(s) => s,
        Err(e) => return e,
    };

    let client = StripeClient::new(&state.gateway);
    match client.verify_webhook_signature(&body, &signature) {
        Ok(()) => {}
        Err(VerificationError::BadSignature) => {
            tracing::warn!("Stripe webhook rejected: bad signature");
            return (StatusCode::BAD_REQUEST, "Invalid signature");
        }
        Err(VerificationError::StalePayload) => {
            return (StatusCode::BAD_REQUEST, "Stale webhook timestamp");
        }
    }

    let event = match parse_event(&body) {
        Ok(ev) => ev,
        Err(outcome) => return outcome_response(outcome),
    };

    let mut conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    match dispatch(&mut conn, &event) {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => {
            // Store fault: answer 5xx so the provider redelivers.
            tracing::error!("webhook dispatch failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

fn extract_signature(headers: &HeaderMap) -> Result<String, WebhookResult> {
    headers
        .get("stripe-signature")
        .ok_or((StatusCode::BAD_REQUEST, "Missing stripe-signature header"))?
        .to_str()
        .map(|s| s.to_string())
        .map_err(|e| {
            tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
            (StatusCode::BAD_REQUEST, "Invalid signature header")
        })
}

fn outcome_response(outcome: DispatchOutcome) -> WebhookResult {
    match outcome {
        DispatchOutcome::Applied => (StatusCode::OK, "Webhook handled"),
        DispatchOutcome::AlreadyApplied => (StatusCode::OK, "Already processed"),
        // 200 on purpose: retrying a delivery for a nonexistent order can
        // never succeed, so the provider must stop.
        DispatchOutcome::OrderNotFound => (StatusCode::OK, "Order not found"),
        DispatchOutcome::Unhandled => (StatusCode::OK, "Event ignored"),
        // 400: the same malformed payload will not change on retry.
        DispatchOutcome::Malformed => (StatusCode::BAD_REQUEST, "Invalid payload"),
    }
}

/// Parse a signature-verified payload into a reconciliation event.
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent, DispatchOutcome> {
    let event: StripeWebhookEvent = serde_json::from_slice(body).map_err(|e| {
        tracing::error!("Failed to parse Stripe webhook: {}", e);
        DispatchOutcome::Malformed
    })?;

    match event.event_type.as_str() {
        "checkout.session.completed" => parse_checkout_completed(&event),
        "charge.refunded" => parse_charge_refunded(&event),
        "payment_intent.payment_failed" => parse_payment_failed(&event),
        other => {
            tracing::debug!(event_type = %other, "ignoring unhandled event type");
            Ok(WebhookEvent::Unhandled)
        }
    }
}

fn parse_checkout_completed(event: &StripeWebhookEvent) -> Result<WebhookEvent, DispatchOutcome> {
    let session: StripeCheckoutSessionObject = serde_json::from_value(event.data.object.clone())
        .map_err(|e| {
            tracing::error!("Failed to parse checkout session: {}", e);
            DispatchOutcome::Malformed
        })?;

    let Some(order_id) = session.metadata.order_id else {
        tracing::error!(session_id = %session.id, "checkout session has no order_id metadata");
        return Err(DispatchOutcome::Malformed);
    };

    Ok(WebhookEvent::CheckoutCompleted(PaymentCompletedData {
        order_id,
        session_id: session.id,
        payment_intent: session.payment_intent,
    }))
}

fn parse_charge_refunded(event: &StripeWebhookEvent) -> Result<WebhookEvent, DispatchOutcome> {
    let charge: StripeCharge = serde_json::from_value(event.data.object.clone()).map_err(|e| {
        tracing::error!("Failed to parse charge: {}", e);
        DispatchOutcome::Malformed
    })?;

    let Some(order_id) = charge.metadata.order_id else {
        tracing::error!(charge_id = %charge.id, "charge has no order_id metadata");
        return Err(DispatchOutcome::Malformed);
    };

    // Reason of the first refund on the charge, if the provider included it.
    let reason = charge
        .refunds
        .data
        .first()
        .and_then(|r| r.reason.clone());

    Ok(WebhookEvent::ChargeRefunded(ChargeRefundedData {
        order_id,
        charge_id: charge.id,
        amount_refunded_minor: charge.amount_refunded,
        reason,
    }))
}

fn parse_payment_failed(event: &StripeWebhookEvent) -> Result<WebhookEvent, DispatchOutcome> {
    let intent: StripePaymentIntent =
        serde_json::from_value(event.data.object.clone()).map_err(|e| {
            tracing::error!("Failed to parse payment intent: {}", e);
            DispatchOutcome::Malformed
        })?;

    let Some(order_id) = intent.metadata.order_id else {
        tracing::error!(payment_intent = %intent.id, "payment intent has no order_id metadata");
        return Err(DispatchOutcome::Malformed);
    };

    let message = intent.last_payment_error.and_then(|e| e.message);

    Ok(WebhookEvent::PaymentFailed(PaymentFailedData {
        order_id,
        payment_intent: intent.id,
        message,
    }))
}
