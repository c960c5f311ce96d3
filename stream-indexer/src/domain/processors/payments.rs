//! Payment gateway callbacks
//!
//! Callbacks are off-chain, so they carry no block context and their writes
//! are never journaled. Idempotency comes from the `reference:status` key of
//! the recorded callback.

use crate::adapters::fanout::FanOut;
use crate::adapters::storage::Projection;
use crate::core::{Domain, HandleOutcome, IndexerResult, WriteScope};
use crate::domain::models::{
    Document, NotificationDraft, PaymentCallback, PaymentData, PaymentEventRecord, PaymentStatus, PendingPurchase,
    Priority,
};
use chrono::Utc;
use tracing::{debug, info, warn};

const DOMAIN: Domain = Domain::Payments;

pub struct PaymentProcessor {
    projection: Projection,
    fanout: FanOut,
}

impl PaymentProcessor {
    pub fn new(projection: Projection, fanout: FanOut) -> Self {
        Self { projection, fanout }
    }

    /// Apply one callback
    ///
    /// Types other than succeeded, failed and refunded are acknowledged
    /// without effect.
    pub async fn handle(&self, callback: &PaymentCallback) -> IndexerResult<HandleOutcome> {
        let Some(status) = callback.status() else {
            debug!(kind = %callback.kind, "ignoring payment callback type");
            return Ok(HandleOutcome::Unimplemented);
        };
        let data: PaymentData = serde_json::from_value(callback.data.clone())?;

        let record = PaymentEventRecord {
            reference: data.reference.clone(),
            status,
            stream_id: data.stream_id,
            buyer: data.buyer.clone(),
            amount: data.amount,
            currency: data.currency.clone(),
            received_at: Utc::now(),
        };
        if !self.projection.insert_new(DOMAIN, &WriteScope::OffChain, &record).await? {
            debug!(reference = %data.reference, ?status, "payment callback already applied");
            return Ok(HandleOutcome::Duplicate);
        }

        if let Err(e) = self.update_purchase(&data, status).await {
            // Forget the callback so the gateway's retry is applied
            if let Err(undo) = self.projection.remove::<PaymentEventRecord>(&record.key()).await {
                warn!(reference = %data.reference, error = %undo, "payment record could not be released");
            }
            return Err(e);
        }
        info!(reference = %data.reference, ?status, "payment callback applied");

        let currency = data.currency.as_deref().unwrap_or("");
        let draft = match status {
            PaymentStatus::Succeeded => NotificationDraft::new(
                "Payment received",
                format!("Payment of {} {} for stream #{} succeeded", data.amount, currency, data.stream_id),
            ),
            PaymentStatus::Failed => NotificationDraft::new(
                "Payment failed",
                format!("Payment for stream #{} failed", data.stream_id),
            )
            .priority(Priority::High),
            PaymentStatus::Refunded => NotificationDraft::new(
                "Payment refunded",
                format!("Payment of {} {} for stream #{} was refunded", data.amount, currency, data.stream_id),
            ),
        };
        self.fanout
            .notify(
                DOMAIN,
                &data.buyer,
                draft.action_url(format!("/marketplace/{}", data.stream_id)),
                None,
            )
            .await;
        Ok(HandleOutcome::Applied)
    }

    async fn update_purchase(&self, data: &PaymentData, status: PaymentStatus) -> IndexerResult<()> {
        let key = PendingPurchase::key_for(data.stream_id, &data.buyer);
        match self.projection.get::<PendingPurchase>(&key).await? {
            Some(mut purchase) => {
                purchase.payment_status = Some(status);
                purchase.payment_reference = Some(data.reference.clone());
                self.projection
                    .upsert(DOMAIN, &WriteScope::OffChain, &purchase)
                    .await?;
            }
            None => warn!(
                reference = %data.reference,
                stream_id = %data.stream_id,
                buyer = %data.buyer,
                "payment for unknown purchase"
            ),
        }
        Ok(())
    }
}
