use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::OrderStatus;
use crate::payments::StripeClient;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub order_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub session_id: String,
}

/// Create a hosted checkout session for a pending order and return the
/// redirect URL for the buyer.
///
/// On a provider failure the order stays pending, a failure note is
/// appended, and no session id is written; the buyer sees the error and
/// can retry.
pub async fn initiate_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let conn = state.db.get()?;

    let order = queries::get_order(&conn, request.order_id)?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    if order.status != OrderStatus::Pending {
        return Err(AppError::BadRequest(format!(
            "order is {} and cannot start a new payment",
            order.status.as_str()
        )));
    }

    queries::append_order_note(&conn, order.id, "Customer initiated Stripe payment.")?;

    let success_url = format!("{}/checkout/success?order_id={}", state.base_url, order.id);
    let cancel_url = format!("{}/checkout/cancel?order_id={}", state.base_url, order.id);

    let client = StripeClient::new(&state.gateway);
    let session = match client
        .create_checkout_session(&order, &success_url, &cancel_url)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            queries::append_order_note(&conn, order.id, &format!("Stripe payment failed: {}", e))?;
            return Err(e.into());
        }
    };

    queries::set_checkout_session(&conn, order.id, &session.id)?;
    queries::append_order_note(
        &conn,
        order.id,
        &format!(
            "Stripe checkout session created (ID: {}). Customer redirected to Stripe.",
            session.id
        ),
    )?;

    tracing::info!(
        order_id = order.id,
        session_id = %session.id,
        "checkout session created"
    );

    Ok(Json(CheckoutResponse {
        checkout_url: session.url,
        session_id: session.id,
    }))
}
