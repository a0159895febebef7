use axum::extract::State;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::models::{CreateOrder, Order, OrderNote};
use crate::util::parse_major_units;

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub notes: Vec<OrderNote>,
}

/// Create a pending order.
///
/// `total` arrives as a major-unit decimal string; this is the single point
/// where it becomes minor units.
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrder>,
) -> Result<Json<Order>> {
    let total_minor = parse_major_units(&request.total)?;
    if total_minor == 0 {
        return Err(AppError::BadRequest("order total must be positive".into()));
    }

    if request.currency.len() != 3 || !request.currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::BadRequest(
            "currency must be a three-letter ISO code".into(),
        ));
    }

    let conn = state.db.get()?;
    let order = queries::create_order(&conn, total_minor, &request.currency.to_lowercase())?;

    tracing::info!(order_id = order.id, "order created");

    Ok(Json(order))
}

/// Fetch an order together with its audit trail. The notes alone carry
/// enough correlation data to reconstruct every reconciliation decision.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderDetail>> {
    let conn = state.db.get()?;

    let order = queries::get_order(&conn, order_id)?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    let notes = queries::list_order_notes(&conn, order_id)?;

    Ok(Json(OrderDetail { order, notes }))
}
