//! API route definitions

use super::{handlers::*, websocket::websocket_handler, ApiState};
use axum::{
    routing::get,
    Router,
};

/// Webhook endpoints: one per domain plus the payment gateway callback
pub fn create_webhook_routes() -> Router<ApiState> {
    Router::new()
        .route("/api/webhooks/payments", get(payment_descriptor).post(ingest_payment))
        .route("/api/webhooks/:domain", get(webhook_descriptor).post(ingest_webhook))
}

/// Real-time subscriptions
pub fn create_realtime_routes() -> Router<ApiState> {
    Router::new().route("/ws", get(websocket_handler))
}
