//! Payload gate: rate limit, shared secret, structural validation
//!
//! Checks run in that order and the first failure ends the request before
//! anything is reconciled or applied.

use crate::chainhook::Batch;
use crate::config::RateLimitConfig;
use crate::metrics::Metrics;
use axum::http::{HeaderMap, StatusCode};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateRejection {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("unauthorized")]
    Unauthorized,

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl GateRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            GateRejection::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GateRejection::Unauthorized => StatusCode::UNAUTHORIZED,
            GateRejection::Malformed(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            GateRejection::RateLimited => "rate_limited",
            GateRejection::Unauthorized => "unauthorized",
            GateRejection::Malformed(_) => "malformed",
        }
    }
}

pub struct PayloadGate {
    limiter: DefaultKeyedRateLimiter<String>,
    token: Option<String>,
    payment_secret: Option<String>,
    trust_forwarded_for: bool,
    metrics: Option<Metrics>,
}

impl PayloadGate {
    pub fn new(config: &RateLimitConfig, token: Option<String>, payment_secret: Option<String>) -> Self {
        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(per_minute).allow_burst(burst);

        let token = token.filter(|t| !t.is_empty());
        if token.is_none() {
            warn!("no chainhook token configured, every webhook delivery will be refused");
        }
        Self {
            limiter: RateLimiter::keyed(quota),
            token,
            payment_secret: payment_secret.filter(|s| !s.is_empty()),
            trust_forwarded_for: config.trust_forwarded_for,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Rate limit key for a request
    pub fn client_identity(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        client_identity(headers, peer, self.trust_forwarded_for)
    }

    /// Drop limiter entries for clients whose budget has fully refilled
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Clients the limiter currently holds state for
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Admit a notifier delivery, returning the typed batch
    pub fn admit(&self, client: &str, headers: &HeaderMap, body: &[u8]) -> Result<Batch, GateRejection> {
        self.check(|| {
            self.check_rate(client)?;
            self.check_token(headers)?;
            serde_json::from_slice::<Batch>(body).map_err(|e| GateRejection::Malformed(e.to_string()))
        })
    }

    /// Admit a payment gateway callback after verifying its body signature
    pub fn admit_signed<T: serde::de::DeserializeOwned>(
        &self,
        client: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<T, GateRejection> {
        self.check(|| {
            self.check_rate(client)?;
            self.check_signature(headers, body)?;
            serde_json::from_slice::<T>(body).map_err(|e| GateRejection::Malformed(e.to_string()))
        })
    }

    fn check<T>(&self, run: impl FnOnce() -> Result<T, GateRejection>) -> Result<T, GateRejection> {
        run().map_err(|rejection| {
            debug!(reason = rejection.reason(), "request rejected at gate");
            if let Some(metrics) = &self.metrics {
                metrics.gate_rejections.with_label_values(&[rejection.reason()]).inc();
            }
            rejection
        })
    }

    fn check_rate(&self, client: &str) -> Result<(), GateRejection> {
        self.limiter
            .check_key(&client.to_string())
            .map_err(|_| GateRejection::RateLimited)
    }

    /// `Authorization: Bearer <token>` or the bare token
    fn check_token(&self, headers: &HeaderMap) -> Result<(), GateRejection> {
        let expected = self.token.as_deref().ok_or(GateRejection::Unauthorized)?;
        let presented = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim())
            .ok_or(GateRejection::Unauthorized)?;

        if constant_time_eq(presented, expected) {
            Ok(())
        } else {
            Err(GateRejection::Unauthorized)
        }
    }

    /// `X-Signature: hex(HMAC-SHA256(secret, body))`
    fn check_signature(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), GateRejection> {
        let secret = self.payment_secret.as_deref().ok_or(GateRejection::Unauthorized)?;
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| hex::decode(v.trim()).ok())
            .ok_or(GateRejection::Unauthorized)?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| GateRejection::Unauthorized)?;
        mac.update(body);
        mac.verify_slice(&signature).map_err(|_| GateRejection::Unauthorized)
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Client identity for rate limiting
///
/// The first `X-Forwarded-For` entry is used only when `trust_forwarded_for`
/// is set; otherwise the peer address.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    let forwarded = if trust_forwarded_for {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    } else {
        None
    };
    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Background task dropping idle limiter entries
pub async fn cleanup_task(gate: Arc<PayloadGate>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let before = gate.tracked_clients();
        gate.retain_recent();
        let after = gate.tracked_clients();
        if after < before {
            debug!(dropped = before - after, tracked = after, "rate limiter entries cleaned up");
        }
    }
}

/// Signature a payment gateway would send for `body`
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
