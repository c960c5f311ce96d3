//! Payment stream events

use super::{DomainEvent, Fields};
use crate::core::{DecodeError, Domain};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCreated {
    pub stream_id: u128,
    pub sender: String,
    pub recipient: String,
    pub amount: u128,
    pub rate_per_block: u128,
    pub start_block: u64,
    pub end_block: u64,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamWithdrawal {
    pub stream_id: u128,
    pub recipient: String,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRefueled {
    pub stream_id: u128,
    pub sender: String,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSenderUpdated {
    pub stream_id: u128,
    pub old_sender: String,
    pub new_sender: String,
}

/// Pause or resume, both issued by the sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamToggled {
    pub stream_id: u128,
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCancelled {
    pub stream_id: u128,
    pub sender: String,
    pub recipient: String,
    pub sender_refund: u128,
    pub recipient_payout: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Created(StreamCreated),
    Withdrawal(StreamWithdrawal),
    Refueled(StreamRefueled),
    SenderUpdated(StreamSenderUpdated),
    Paused(StreamToggled),
    Resumed(StreamToggled),
    Cancelled(StreamCancelled),
}

impl StreamEvent {
    pub fn stream_id(&self) -> u128 {
        match self {
            StreamEvent::Created(e) => e.stream_id,
            StreamEvent::Withdrawal(e) => e.stream_id,
            StreamEvent::Refueled(e) => e.stream_id,
            StreamEvent::SenderUpdated(e) => e.stream_id,
            StreamEvent::Paused(e) | StreamEvent::Resumed(e) => e.stream_id,
            StreamEvent::Cancelled(e) => e.stream_id,
        }
    }
}

impl DomainEvent for StreamEvent {
    const DOMAIN: Domain = Domain::Streams;

    const TAGS: &'static [&'static str] = &[
        "stream-created",
        "stream-withdrawal",
        "stream-refueled",
        "stream-sender-updated",
        "stream-paused",
        "stream-resumed",
        "stream-cancelled",
    ];

    fn decode(tag: &str, f: &Fields<'_>) -> Result<Self, DecodeError> {
        let event = match tag {
            "stream-created" => StreamEvent::Created(StreamCreated {
                stream_id: f.uint("stream-id")?,
                sender: f.principal("sender")?,
                recipient: f.principal("recipient")?,
                amount: f.uint("amount")?,
                rate_per_block: f.uint("rate-per-block")?,
                start_block: f.u64("start-block")?,
                end_block: f.u64("end-block")?,
                token: f.opt_principal("token")?,
            }),
            "stream-withdrawal" => StreamEvent::Withdrawal(StreamWithdrawal {
                stream_id: f.uint("stream-id")?,
                recipient: f.principal("recipient")?,
                amount: f.uint("amount")?,
            }),
            "stream-refueled" => StreamEvent::Refueled(StreamRefueled {
                stream_id: f.uint("stream-id")?,
                sender: f.principal("sender")?,
                amount: f.uint("amount")?,
            }),
            "stream-sender-updated" => StreamEvent::SenderUpdated(StreamSenderUpdated {
                stream_id: f.uint("stream-id")?,
                old_sender: f.principal("old-sender")?,
                new_sender: f.principal("new-sender")?,
            }),
            "stream-paused" => StreamEvent::Paused(StreamToggled {
                stream_id: f.uint("stream-id")?,
                sender: f.principal("sender")?,
            }),
            "stream-resumed" => StreamEvent::Resumed(StreamToggled {
                stream_id: f.uint("stream-id")?,
                sender: f.principal("sender")?,
            }),
            "stream-cancelled" => StreamEvent::Cancelled(StreamCancelled {
                stream_id: f.uint("stream-id")?,
                sender: f.principal("sender")?,
                recipient: f.principal("recipient")?,
                sender_refund: f.opt_uint("sender-refund")?.unwrap_or(0),
                recipient_payout: f.opt_uint("recipient-payout")?.unwrap_or(0),
            }),
            other => return Err(DecodeError::UnknownTag(other.to_string())),
        };
        Ok(event)
    }

    fn tag(&self) -> &'static str {
        match self {
            StreamEvent::Created(_) => "stream-created",
            StreamEvent::Withdrawal(_) => "stream-withdrawal",
            StreamEvent::Refueled(_) => "stream-refueled",
            StreamEvent::SenderUpdated(_) => "stream-sender-updated",
            StreamEvent::Paused(_) => "stream-paused",
            StreamEvent::Resumed(_) => "stream-resumed",
            StreamEvent::Cancelled(_) => "stream-cancelled",
        }
    }
}
