//! Webhook request handlers

use super::{
    error::ApiError,
    responses::ServiceDescriptor,
    ApiState,
};
use crate::core::{Domain, IndexerError};
use crate::domain::models::PaymentCallback;
use crate::pipeline::{BatchIngest, BatchResult, WebhookResponse};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::HeaderMap,
    response::Json,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

const SERVICE: &str = "stream-indexer";

const PAYMENT_EVENTS: &[&str] = &["payment.succeeded", "payment.failed", "payment.refunded"];

fn pipeline_for(state: &ApiState, name: &str) -> Result<(Domain, Arc<dyn BatchIngest>), ApiError> {
    Domain::parse(name)
        .and_then(|domain| state.pipelines.get(&domain).map(|p| (domain, p.clone())))
        .ok_or_else(|| ApiError::NotFound(format!("no webhook for domain {}", name)))
}

fn descriptor(domain: &str, events: &[&str]) -> ServiceDescriptor {
    ServiceDescriptor {
        service: SERVICE.to_string(),
        domain: domain.to_string(),
        supported_events: events.iter().map(|e| e.to_string()).collect(),
        status: "active".to_string(),
    }
}

/// Capability descriptor for one domain endpoint
pub async fn webhook_descriptor(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<ServiceDescriptor>, ApiError> {
    let (domain, pipeline) = pipeline_for(&state, &name)?;
    Ok(Json(descriptor(domain.as_str(), pipeline.supported_events())))
}

/// Receive one notifier batch for a domain
///
/// The batch runs on its own task so a dropped connection never stops it
/// half-way through a block.
pub async fn ingest_webhook(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let (domain, pipeline) = pipeline_for(&state, &name)?;
    let client = state.gate.client_identity(&headers, peer.map(|ConnectInfo(addr)| addr));
    let batch = state.gate.admit(&client, &headers, &body)?;

    let result = tokio::spawn(async move { pipeline.ingest(batch).await })
        .await
        .map_err(|e| ApiError::Internal(format!("{} batch task failed: {}", domain, e)))?;

    if !result.success() {
        warn!(%domain, errors = ?result.errors, "batch finished with errors");
    }
    Ok(Json(result.into_response(domain.as_str())))
}

pub async fn payment_descriptor() -> Json<ServiceDescriptor> {
    Json(descriptor(Domain::Payments.as_str(), PAYMENT_EVENTS))
}

/// Receive one signed payment gateway callback
pub async fn ingest_payment(
    State(state): State<ApiState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let client = state.gate.client_identity(&headers, peer.map(|ConnectInfo(addr)| addr));
    let callback: PaymentCallback = state.gate.admit_signed(&client, &headers, &body)?;
    let kind = callback.kind.clone();

    let payments = state.payments.clone();
    let outcome = tokio::spawn(async move { payments.handle(&callback).await })
        .await
        .map_err(|e| ApiError::Internal(format!("payment task failed: {}", e)))?;

    let mut result = BatchResult::default();
    match outcome {
        Ok(outcome) => result.record(outcome),
        Err(IndexerError::Serialization(e)) => return Err(ApiError::BadRequest(e)),
        Err(e) => {
            warn!(kind = %kind, error = %e, "payment callback failed");
            result.errors.push(format!("Payment {}: {}", kind, e));
        }
    }
    info!(kind = %kind, processed = result.processed, "payment callback handled");
    Ok(Json(result.into_response(kind)))
}
