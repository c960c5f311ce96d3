//! Payment gateway callback records

use super::{amount, Document, PaymentStatus};
use crate::core::Collection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of a payment gateway callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCallback {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PaymentCallback {
    /// Outcome carried by the callback type, `None` for types not tracked
    pub fn status(&self) -> Option<PaymentStatus> {
        match self.kind.as_str() {
            "payment.succeeded" => Some(PaymentStatus::Succeeded),
            "payment.failed" => Some(PaymentStatus::Failed),
            "payment.refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentData {
    pub reference: String,
    #[serde(with = "amount")]
    pub stream_id: u128,
    pub buyer: String,
    #[serde(with = "amount")]
    pub amount: u128,
    #[serde(default)]
    pub currency: Option<String>,
}

/// One applied callback, keyed by `reference:status`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentEventRecord {
    pub reference: String,
    pub status: PaymentStatus,
    #[serde(with = "amount")]
    pub stream_id: u128,
    pub buyer: String,
    #[serde(with = "amount")]
    pub amount: u128,
    pub currency: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl PaymentEventRecord {
    pub fn key_for(reference: &str, status: PaymentStatus) -> String {
        let status = match status {
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        };
        format!("{}:{}", reference, status)
    }
}

impl Document for PaymentEventRecord {
    const COLLECTION: Collection = Collection::PaymentEvents;

    fn key(&self) -> String {
        Self::key_for(&self.reference, self.status)
    }
}
