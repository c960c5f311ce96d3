//! HTTP surface: notifier webhooks, payment callbacks and the realtime feed

pub mod error;
pub mod gate;
mod handlers;
pub mod responses;
mod routes;
mod websocket;

pub use error::ApiError;
pub use gate::{GateRejection, PayloadGate};
pub use routes::*;

use crate::adapters::fanout::BroadcastPublisher;
use crate::adapters::storage::Projection;
use crate::config::ServerConfig;
use crate::core::Domain;
use crate::domain::processors::PaymentProcessor;
use crate::metrics::Metrics;
use crate::pipeline::BatchIngest;
use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

/// Shared API state
#[derive(Clone)]
pub struct ApiState {
    pub pipelines: Arc<HashMap<Domain, Arc<dyn BatchIngest>>>,
    pub payments: Arc<PaymentProcessor>,
    pub gate: Arc<PayloadGate>,
    pub realtime: BroadcastPublisher,
    pub projection: Projection,
}

/// Start the API server
pub async fn start_server(state: ApiState, config: &ServerConfig) -> Result<tokio::task::JoinHandle<()>> {
    let app = create_app(state, config);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("API server listening on {}", config.bind_address);

    let handle = tokio::spawn(async move {
        let service = app.into_make_service_with_connect_info::<SocketAddr>();
        if let Err(e) = axum::serve(listener, service).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(handle)
}

/// Start the metrics server
pub async fn start_metrics_server(
    port: u16,
    metrics: Metrics,
    projection: Projection,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        .merge(
            Router::new()
                .route("/health", get(health_handler))
                .with_state(projection),
        );

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Metrics server listening on {}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    Ok(handle)
}

/// Create the main API application
pub fn create_app(state: ApiState, config: &ServerConfig) -> Router {
    let projection = state.projection.clone();

    let app = Router::new()
        .merge(create_webhook_routes())
        .merge(create_realtime_routes())
        .with_state(state)
        .merge(
            Router::new()
                .route("/health", get(health_handler))
                .with_state(projection),
        )
        .layer(DefaultBodyLimit::max(config.max_request_size_mb * 1024 * 1024))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs))),
        );

    if config.enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Health check handler
async fn health_handler(State(projection): State<Projection>) -> (StatusCode, Json<Value>) {
    let (status, healthy) = match projection.store().health_check().await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(e) => {
            tracing::warn!(error = %e, "store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };
    (
        status,
        Json(json!({
            "status": healthy,
            "timestamp": chrono::Utc::now().timestamp(),
            "service": "stream-indexer"
        })),
    )
}

async fn metrics_handler(State(metrics): State<Metrics>) -> Result<String, StatusCode> {
    metrics.render().map_err(|e| {
        tracing::error!("Failed to render metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
