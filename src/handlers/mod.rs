pub mod checkout;
pub mod orders;
pub mod refund;
pub mod webhooks;

use axum::{
    routing::{get, post},
    Router,
};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", post(orders::create_order))
        .route("/orders/{id}", get(orders::get_order))
        .route("/checkout", post(checkout::initiate_checkout))
        .route("/refund", post(refund::initiate_refund))
        .merge(webhooks::router())
}
