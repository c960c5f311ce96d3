//! Payment stream processor

use super::DomainProcessor;
use crate::adapters::fanout::FanOut;
use crate::adapters::storage::Projection;
use crate::core::{Domain, HandleOutcome, IndexerResult, ProcessingContext, UNKNOWN_PRINCIPAL};
use crate::domain::events::{
    DomainEvent, StreamCancelled, StreamCreated, StreamEvent, StreamRefueled, StreamSenderUpdated,
    StreamToggled, StreamWithdrawal,
};
use crate::domain::models::{
    stream_channel, NotificationDraft, Priority, RealtimeEvent, Stream, StreamStatus,
    StreamWithdrawalRecord,
};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

const DOMAIN: Domain = Domain::Streams;

pub struct StreamProcessor {
    projection: Projection,
    fanout: FanOut,
}

impl StreamProcessor {
    pub fn new(projection: Projection, fanout: FanOut) -> Self {
        Self { projection, fanout }
    }

    async fn load(&self, stream_id: u128) -> IndexerResult<Option<Stream>> {
        let stream = self.projection.get::<Stream>(&Stream::key_for(stream_id)).await?;
        if stream.is_none() {
            warn!(stream_id = %stream_id, "event for unknown stream");
        }
        Ok(stream)
    }

    async fn push(&self, stream_id: u128, event: &str, context: &ProcessingContext, payload: serde_json::Value) {
        self.fanout
            .broadcast(RealtimeEvent::new(stream_channel(stream_id), event, payload).at(context))
            .await;
    }

    async fn created(&self, e: StreamCreated, context: &ProcessingContext) -> IndexerResult<()> {
        let height = context.block_height();
        let stream = Stream {
            stream_id: e.stream_id,
            sender: e.sender.clone(),
            recipient: e.recipient.clone(),
            token: e.token,
            deposited: e.amount,
            balance: e.amount,
            withdrawn: 0,
            rate_per_block: e.rate_per_block,
            start_block: e.start_block,
            end_block: e.end_block,
            status: StreamStatus::Active,
            sender_refund: None,
            recipient_payout: None,
            created_at_block: height,
            created_tx: context.tx_hash.clone(),
            updated_at_block: height,
        };
        self.projection.upsert(DOMAIN, &context.scope(), &stream).await?;

        self.fanout
            .notify(
                DOMAIN,
                &e.sender,
                NotificationDraft::new(
                    "Stream created",
                    format!("Stream #{} to {} is live with {} deposited", e.stream_id, e.recipient, e.amount),
                )
                .action_url(format!("/streams/{}", e.stream_id)),
                Some(context),
            )
            .await;
        self.fanout
            .notify(
                DOMAIN,
                &e.recipient,
                NotificationDraft::new(
                    "Incoming stream",
                    format!(
                        "{} started stream #{} paying {} per block",
                        e.sender, e.stream_id, e.rate_per_block
                    ),
                )
                .priority(Priority::High)
                .action_url(format!("/streams/{}", e.stream_id)),
                Some(context),
            )
            .await;
        self.push(e.stream_id, "stream-created", context, serde_json::to_value(&stream)?)
            .await;
        Ok(())
    }

    async fn withdrawal(&self, e: StreamWithdrawal, context: &ProcessingContext) -> IndexerResult<()> {
        let record = StreamWithdrawalRecord {
            event_key: context.event_key(),
            stream_id: e.stream_id,
            recipient: e.recipient.clone(),
            amount: e.amount,
            block_height: context.block_height(),
            tx_hash: context.tx_hash.clone(),
        };
        self.projection.upsert(DOMAIN, &context.scope(), &record).await?;

        let mut sender = UNKNOWN_PRINCIPAL.to_string();
        let mut balance = None;
        if let Some(mut stream) = self.load(e.stream_id).await? {
            stream.record_withdrawal(e.amount, context.block_height());
            self.projection.upsert(DOMAIN, &context.scope(), &stream).await?;
            sender = stream.sender;
            balance = Some(stream.balance);
        }

        self.fanout
            .notify(
                DOMAIN,
                &e.recipient,
                NotificationDraft::new(
                    "Withdrawal confirmed",
                    format!("You withdrew {} from stream #{}", e.amount, e.stream_id),
                ),
                Some(context),
            )
            .await;
        self.fanout
            .notify(
                DOMAIN,
                &sender,
                NotificationDraft::new(
                    "Stream withdrawal",
                    format!("{} withdrew {} from stream #{}", e.recipient, e.amount, e.stream_id),
                )
                .priority(Priority::Low),
                Some(context),
            )
            .await;
        self.push(
            e.stream_id,
            "stream-withdrawal",
            context,
            json!({ "amount": e.amount.to_string(), "balance": balance.map(|b| b.to_string()) }),
        )
        .await;
        Ok(())
    }

    async fn refueled(&self, e: StreamRefueled, context: &ProcessingContext) -> IndexerResult<()> {
        let mut recipient = UNKNOWN_PRINCIPAL.to_string();
        let mut balance = None;
        if let Some(mut stream) = self.load(e.stream_id).await? {
            stream.record_refuel(e.amount, context.block_height());
            self.projection.upsert(DOMAIN, &context.scope(), &stream).await?;
            recipient = stream.recipient;
            balance = Some(stream.balance);
        }

        self.fanout
            .notify(
                DOMAIN,
                &recipient,
                NotificationDraft::new(
                    "Stream refueled",
                    format!("{} added {} to stream #{}", e.sender, e.amount, e.stream_id),
                ),
                Some(context),
            )
            .await;
        self.push(
            e.stream_id,
            "stream-refueled",
            context,
            json!({ "amount": e.amount.to_string(), "balance": balance.map(|b| b.to_string()) }),
        )
        .await;
        Ok(())
    }

    async fn sender_updated(&self, e: StreamSenderUpdated, context: &ProcessingContext) -> IndexerResult<()> {
        let mut recipient = UNKNOWN_PRINCIPAL.to_string();
        if let Some(mut stream) = self.load(e.stream_id).await? {
            stream.sender = e.new_sender.clone();
            stream.updated_at_block = context.block_height();
            self.projection.upsert(DOMAIN, &context.scope(), &stream).await?;
            recipient = stream.recipient;
        }

        let body = format!(
            "Stream #{} is now funded by {} instead of {}",
            e.stream_id, e.new_sender, e.old_sender
        );
        for user in [e.old_sender.as_str(), e.new_sender.as_str(), recipient.as_str()] {
            self.fanout
                .notify(DOMAIN, user, NotificationDraft::new("Stream sender changed", body.clone()), Some(context))
                .await;
        }
        self.push(
            e.stream_id,
            "stream-sender-updated",
            context,
            json!({ "old_sender": e.old_sender, "new_sender": e.new_sender }),
        )
        .await;
        Ok(())
    }

    async fn toggled(&self, e: StreamToggled, paused: bool, context: &ProcessingContext) -> IndexerResult<()> {
        let mut recipient = UNKNOWN_PRINCIPAL.to_string();
        if let Some(mut stream) = self.load(e.stream_id).await? {
            if stream.status != StreamStatus::Cancelled {
                stream.status = if paused { StreamStatus::Paused } else { StreamStatus::Active };
            }
            stream.updated_at_block = context.block_height();
            self.projection.upsert(DOMAIN, &context.scope(), &stream).await?;
            recipient = stream.recipient;
        }

        let (title, verb, tag) = if paused {
            ("Stream paused", "paused", "stream-paused")
        } else {
            ("Stream resumed", "resumed", "stream-resumed")
        };
        self.fanout
            .notify(
                DOMAIN,
                &recipient,
                NotificationDraft::new(title, format!("{} {} stream #{}", e.sender, verb, e.stream_id)),
                Some(context),
            )
            .await;
        self.push(e.stream_id, tag, context, json!({ "sender": e.sender })).await;
        Ok(())
    }

    async fn cancelled(&self, e: StreamCancelled, context: &ProcessingContext) -> IndexerResult<()> {
        if let Some(mut stream) = self.load(e.stream_id).await? {
            stream.status = StreamStatus::Cancelled;
            stream.balance = 0;
            stream.withdrawn = stream.withdrawn.saturating_add(e.recipient_payout);
            stream.sender_refund = Some(e.sender_refund);
            stream.recipient_payout = Some(e.recipient_payout);
            stream.updated_at_block = context.block_height();
            self.projection.upsert(DOMAIN, &context.scope(), &stream).await?;
        }

        self.fanout
            .notify(
                DOMAIN,
                &e.sender,
                NotificationDraft::new(
                    "Stream cancelled",
                    format!("Stream #{} was cancelled, {} refunded to you", e.stream_id, e.sender_refund),
                ),
                Some(context),
            )
            .await;
        self.fanout
            .notify(
                DOMAIN,
                &e.recipient,
                NotificationDraft::new(
                    "Stream cancelled",
                    format!("Stream #{} was cancelled, {} paid out to you", e.stream_id, e.recipient_payout),
                )
                .priority(Priority::High),
                Some(context),
            )
            .await;
        self.push(
            e.stream_id,
            "stream-cancelled",
            context,
            json!({
                "sender_refund": e.sender_refund.to_string(),
                "recipient_payout": e.recipient_payout.to_string(),
            }),
        )
        .await;
        Ok(())
    }
}

#[async_trait]
impl DomainProcessor for StreamProcessor {
    type Event = StreamEvent;

    async fn handle(&self, event: StreamEvent, context: &ProcessingContext) -> IndexerResult<HandleOutcome> {
        if !self.projection.claim(DOMAIN, context).await? {
            return Ok(HandleOutcome::Duplicate);
        }
        debug!(event = %event.tag(), stream_id = %event.stream_id(), tx = %context.tx_hash, "applying stream event");

        match event {
            StreamEvent::Created(e) => self.created(e, context).await?,
            StreamEvent::Withdrawal(e) => self.withdrawal(e, context).await?,
            StreamEvent::Refueled(e) => self.refueled(e, context).await?,
            StreamEvent::SenderUpdated(e) => self.sender_updated(e, context).await?,
            StreamEvent::Paused(e) => self.toggled(e, true, context).await?,
            StreamEvent::Resumed(e) => self.toggled(e, false, context).await?,
            StreamEvent::Cancelled(e) => self.cancelled(e, context).await?,
        }
        Ok(HandleOutcome::Applied)
    }
}
