//! API integration tests

mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::*;
use serde_json::{json, Value};
use stream_indexer::adapters::storage::Projection;
use stream_indexer::api::{create_app, gate::sign_payload, gate::SIGNATURE_HEADER};
use stream_indexer::core::{Collection, ProjectionStore};
use stream_indexer::domain::models::{PaymentStatus, PendingPurchase};
use tower::ServiceExt; // for `oneshot`

fn app(harness: &Harness) -> Router {
    create_app(harness.container.api_state(), &harness.container.config.server)
}

async fn send(app: Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = app.oneshot(request).await?;
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)?
    };
    Ok((status, body))
}

fn webhook(domain: &str, token: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri(format!("/api/webhooks/{}", domain))
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    request.body(body.into()).unwrap()
}

fn payment(body: &Value, secret: &str) -> Request<Body> {
    let raw = serde_json::to_vec(body).unwrap();
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/payments")
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, sign_payload(secret, &raw))
        .body(Body::from(raw))
        .unwrap()
}

fn single_listing() -> Value {
    apply(vec![block(
        20,
        "0xa20",
        vec![tx(
            "0x0l",
            true,
            vec![print(json!({ "event": "market-nft-listed", "stream-id": 7, "seller": "SP_A", "price": 950000 }))],
        )],
    )])
}

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let harness = Harness::new();
    let request = Request::builder().uri("/health").body(Body::empty())?;

    let (status, body) = send(app(&harness), request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn test_webhook_requires_token() -> Result<()> {
    let harness = Harness::new();
    let batch = serde_json::to_vec(&single_listing())?;

    let (status, body) = send(app(&harness), webhook("marketplace", None, batch.clone())).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 401);

    let (status, _) = send(app(&harness), webhook("marketplace", Some("wrong-token"), batch)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Nothing reached the projection
    assert!(harness.store.get(Collection::Listings, "7").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_webhook_rejects_malformed_payload() -> Result<()> {
    let harness = Harness::new();

    let (status, _) = send(app(&harness), webhook("streams", Some(TOKEN), "{not json")).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let null_apply = serde_json::to_vec(&json!({ "apply": null, "rollback": [] }))?;
    let (status, _) = send(app(&harness), webhook("streams", Some(TOKEN), null_apply)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_webhook_applies_batch() -> Result<()> {
    let harness = Harness::new();
    let batch = serde_json::to_vec(&single_listing())?;

    let (status, body) = send(app(&harness), webhook("marketplace", Some(TOKEN), batch)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "eventType": "marketplace", "processed": 1 }));
    assert!(harness.store.get(Collection::Listings, "7").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_descriptor_lists_supported_events() -> Result<()> {
    let harness = Harness::new();
    let request = Request::builder().uri("/api/webhooks/treasury").body(Body::empty())?;

    let (status, body) = send(app(&harness), request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "stream-indexer");
    assert_eq!(body["domain"], "treasury");
    assert_eq!(body["status"], "active");
    let events: Vec<String> = serde_json::from_value(body["supportedEvents"].clone())?;
    assert!(events.contains(&"treasury-withdrawal-approved".to_string()));

    let request = Request::builder().uri("/api/webhooks/payments").body(Body::empty())?;
    let (status, body) = send(app(&harness), request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["domain"], "payments");
    Ok(())
}

#[tokio::test]
async fn test_unknown_domain_is_not_found() -> Result<()> {
    let harness = Harness::new();

    let (status, _) = send(app(&harness), webhook("lending", Some(TOKEN), "{}")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_rate_limit_per_client() -> Result<()> {
    let harness = Harness::configured(|config| {
        config.rate_limit.requests_per_minute = 1;
        config.rate_limit.burst = 1;
        config.rate_limit.trust_forwarded_for = true;
    });
    let empty = || serde_json::to_vec(&json!({ "apply": [], "rollback": [] })).unwrap();
    let from = |client: &str| {
        let mut request = webhook("streams", Some(TOKEN), empty());
        request
            .headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        request
    };

    let (status, _) = send(app(&harness), from("10.0.0.1")).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(app(&harness), from("10.0.0.1")).await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], 429);

    // Another client has its own budget
    let (status, _) = send(app(&harness), from("10.0.0.2")).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_forwarded_for_ignored_unless_trusted() -> Result<()> {
    let harness = Harness::configured(|config| {
        config.rate_limit.requests_per_minute = 1;
        config.rate_limit.burst = 1;
    });
    let from = |client: &str| {
        let empty = serde_json::to_vec(&json!({ "apply": [], "rollback": [] })).unwrap();
        let mut request = webhook("streams", Some(TOKEN), empty);
        request
            .headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        request
    };

    let (status, _) = send(app(&harness), from("10.0.0.1")).await?;
    assert_eq!(status, StatusCode::OK);
    // A spoofed header does not buy a fresh budget
    let (status, _) = send(app(&harness), from("10.0.0.2")).await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    Ok(())
}

#[tokio::test]
async fn test_signed_payment_updates_pending_purchase() -> Result<()> {
    let harness = Harness::new();
    let initiated = apply(vec![block(
        30,
        "0xa30",
        vec![tx(
            "0x0p",
            true,
            vec![print(json!({
                "event": "market-purchase-initiated",
                "stream-id": 7,
                "buyer": "SP_BUYER",
                "price": 950000,
                "expiry-block": 130
            }))],
        )],
    )]);
    let (status, _) = send(
        app(&harness),
        webhook("marketplace", Some(TOKEN), serde_json::to_vec(&initiated)?),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let callback = json!({
        "type": "payment.succeeded",
        "data": {
            "reference": "pay_123",
            "stream_id": "7",
            "buyer": "SP_BUYER",
            "amount": 950000,
            "currency": "usd"
        }
    });
    let (status, body) = send(app(&harness), payment(&callback, PAYMENT_SECRET)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "eventType": "payment.succeeded", "processed": 1 }));

    let purchase = Projection::new(harness.store.clone())
        .get::<PendingPurchase>(&PendingPurchase::key_for(7, "SP_BUYER"))
        .await?
        .expect("purchase projected");
    assert_eq!(purchase.payment_status, Some(PaymentStatus::Succeeded));
    assert_eq!(purchase.payment_reference.as_deref(), Some("pay_123"));

    let received = |notifications: Vec<stream_indexer::domain::models::Notification>| {
        notifications.into_iter().filter(|n| n.title == "Payment received").count()
    };
    assert_eq!(received(harness.notifications_for("SP_BUYER").await), 1);

    // Redelivery is acknowledged without a second notification
    let (status, body) = send(app(&harness), payment(&callback, PAYMENT_SECRET)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1);
    assert_eq!(received(harness.notifications_for("SP_BUYER").await), 1);
    Ok(())
}

#[tokio::test]
async fn test_failed_payment_callback_is_applied_on_retry() -> Result<()> {
    let store = std::sync::Arc::new(FlakyStore::new(Collection::PendingPurchases));
    let harness = Harness::with_store(store.clone(), FakeChain::new(&[], Some(2)));
    harness
        .ingest(
            stream_indexer::core::Domain::Marketplace,
            apply(vec![block(
                30,
                "0xa30",
                vec![tx(
                    "0x0p",
                    true,
                    vec![print(json!({
                        "event": "market-purchase-initiated",
                        "stream-id": 7,
                        "buyer": "SP_BUYER",
                        "price": 950000
                    }))],
                )],
            )]),
        )
        .await;

    let callback = json!({
        "type": "payment.succeeded",
        "data": { "reference": "pay_77", "stream_id": 7, "buyer": "SP_BUYER", "amount": 950000 }
    });
    store.fail(true);
    let (_, body) = send(app(&harness), payment(&callback, PAYMENT_SECRET)).await?;
    assert_eq!(body["success"], false);
    assert_eq!(store.inner.count(Collection::PaymentEvents).await, 0);

    store.fail(false);
    let (status, body) = send(app(&harness), payment(&callback, PAYMENT_SECRET)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 1);

    let purchase = Projection::new(harness.store.clone())
        .get::<PendingPurchase>(&PendingPurchase::key_for(7, "SP_BUYER"))
        .await?
        .expect("purchase projected");
    assert_eq!(purchase.payment_status, Some(PaymentStatus::Succeeded));
    assert_eq!(purchase.payment_reference.as_deref(), Some("pay_77"));
    Ok(())
}

#[tokio::test]
async fn test_payment_signature_is_checked() -> Result<()> {
    let harness = Harness::new();
    let callback = json!({
        "type": "payment.failed",
        "data": { "reference": "pay_9", "stream_id": 1, "buyer": "SP_BUYER", "amount": 5 }
    });

    let (status, _) = send(app(&harness), payment(&callback, "someone-else")).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unsigned = Request::builder()
        .method("POST")
        .uri("/api/webhooks/payments")
        .body(Body::from(serde_json::to_vec(&callback)?))?;
    let (status, _) = send(app(&harness), unsigned).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(harness.notifications_for("SP_BUYER").await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_untracked_payment_type_is_acknowledged() -> Result<()> {
    let harness = Harness::new();
    let callback = json!({ "type": "payment.pending", "data": { "reference": "pay_1" } });

    let (status, body) = send(app(&harness), payment(&callback, PAYMENT_SECRET)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "eventType": "payment.pending", "processed": 0 }));
    Ok(())
}

#[tokio::test]
async fn test_payment_with_missing_fields_is_rejected() -> Result<()> {
    let harness = Harness::new();
    let callback = json!({ "type": "payment.succeeded", "data": { "reference": "pay_2" } });

    let (status, _) = send(app(&harness), payment(&callback, PAYMENT_SECRET)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
