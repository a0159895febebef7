use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::payments::{ProviderError, StripeClient};
use crate::util::{display_amount, parse_major_units};

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub order_id: i64,
    /// Amount in major currency units, e.g. "12.50"
    pub amount: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub refund_id: String,
}

/// Ask the provider to refund (part of) an order's payment.
///
/// Order status is not touched here. Refunds can also be issued from the
/// provider's own dashboard, so the charge.refunded webhook is the single
/// writer of terminal status for both paths.
pub async fn initiate_refund(
    State(state): State<AppState>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<RefundResponse>> {
    let amount_minor = parse_major_units(&request.amount)?;
    if amount_minor == 0 {
        return Err(AppError::BadRequest("refund amount must be positive".into()));
    }

    let conn = state.db.get()?;

    let order = queries::get_order(&conn, request.order_id)?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    let payment_intent = order.payment_intent_id.clone().ok_or_else(|| {
        AppError::BadRequest("Stripe Payment Intent ID not found for this order".into())
    })?;

    let client = StripeClient::new(&state.gateway);
    let refund = match client
        .create_refund(&payment_intent, amount_minor, order.id, &request.reason)
        .await
    {
        Ok(refund) => refund,
        Err(e) => {
            queries::append_order_note(&conn, order.id, &format!("Stripe refund failed: {}", e))?;
            return Err(e.into());
        }
    };

    if refund.status != "succeeded" {
        queries::append_order_note(
            &conn,
            order.id,
            &format!(
                "Stripe refund {} not completed (status: {})",
                refund.id, refund.status
            ),
        )?;
        return Err(AppError::Provider(ProviderError::Api(format!(
            "refund not completed (status: {})",
            refund.status
        ))));
    }

    queries::append_order_note(
        &conn,
        order.id,
        &format!(
            "Refunded {} via Stripe - Refund ID: {}",
            display_amount(amount_minor, &order.currency),
            refund.id
        ),
    )?;

    tracing::info!(
        order_id = order.id,
        refund_id = %refund.id,
        "refund created"
    );

    Ok(Json(RefundResponse {
        refund_id: refund.id,
    }))
}
