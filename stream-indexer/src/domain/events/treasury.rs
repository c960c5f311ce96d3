//! Treasury events: protocol fees and multi-sig withdrawals

use super::{DomainEvent, Fields};
use crate::core::{DecodeError, Domain};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeCollected {
    pub amount: u128,
    pub source: String,
    pub payer: Option<String>,
    pub stream_id: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalProposed {
    pub proposal_id: u128,
    pub proposer: String,
    pub recipient: String,
    pub amount: u128,
    pub expiry_block: u64,
    pub approval_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalApproved {
    pub proposal_id: u128,
    pub approver: String,
    pub approval_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalExecuted {
    pub proposal_id: u128,
    pub executor: String,
    pub recipient: String,
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalCancelled {
    pub proposal_id: u128,
    pub cancelled_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminChanged {
    pub admin: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdUpdated {
    pub threshold: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreasuryEvent {
    FeeCollected(FeeCollected),
    WithdrawalProposed(WithdrawalProposed),
    WithdrawalApproved(WithdrawalApproved),
    WithdrawalExecuted(WithdrawalExecuted),
    WithdrawalCancelled(WithdrawalCancelled),
    AdminAdded(AdminChanged),
    AdminRemoved(AdminChanged),
    ThresholdUpdated(ThresholdUpdated),
}

impl DomainEvent for TreasuryEvent {
    const DOMAIN: Domain = Domain::Treasury;

    const TAGS: &'static [&'static str] = &[
        "treasury-fee-collected",
        "treasury-withdrawal-proposed",
        "treasury-withdrawal-approved",
        "treasury-withdrawal-executed",
        "treasury-withdrawal-cancelled",
        "treasury-admin-added",
        "treasury-admin-removed",
        "treasury-threshold-updated",
    ];

    fn decode(tag: &str, f: &Fields<'_>) -> Result<Self, DecodeError> {
        let event = match tag {
            "treasury-fee-collected" => TreasuryEvent::FeeCollected(FeeCollected {
                amount: f.uint("amount")?,
                source: f.string("source")?,
                payer: f.opt_principal("payer")?,
                stream_id: f.opt_uint("stream-id")?,
            }),
            "treasury-withdrawal-proposed" => TreasuryEvent::WithdrawalProposed(WithdrawalProposed {
                proposal_id: f.uint("proposal-id")?,
                proposer: f.principal("proposer")?,
                recipient: f.principal("recipient")?,
                amount: f.uint("amount")?,
                expiry_block: f.u64("expiry-block")?,
                approval_count: f.opt_u64("approval-count")?,
            }),
            "treasury-withdrawal-approved" => TreasuryEvent::WithdrawalApproved(WithdrawalApproved {
                proposal_id: f.uint("proposal-id")?,
                approver: f.principal("approver")?,
                approval_count: f.u64("approval-count")?,
            }),
            "treasury-withdrawal-executed" => TreasuryEvent::WithdrawalExecuted(WithdrawalExecuted {
                proposal_id: f.uint("proposal-id")?,
                executor: f.principal("executor")?,
                recipient: f.principal("recipient")?,
                amount: f.uint("amount")?,
            }),
            "treasury-withdrawal-cancelled" => TreasuryEvent::WithdrawalCancelled(WithdrawalCancelled {
                proposal_id: f.uint("proposal-id")?,
                cancelled_by: f.principal("cancelled-by")?,
            }),
            "treasury-admin-added" => TreasuryEvent::AdminAdded(AdminChanged {
                admin: f.principal("admin")?,
            }),
            "treasury-admin-removed" => TreasuryEvent::AdminRemoved(AdminChanged {
                admin: f.principal("admin")?,
            }),
            "treasury-threshold-updated" => TreasuryEvent::ThresholdUpdated(ThresholdUpdated {
                threshold: f.u64("threshold")?,
            }),
            other => return Err(DecodeError::UnknownTag(other.to_string())),
        };
        Ok(event)
    }

    fn tag(&self) -> &'static str {
        match self {
            TreasuryEvent::FeeCollected(_) => "treasury-fee-collected",
            TreasuryEvent::WithdrawalProposed(_) => "treasury-withdrawal-proposed",
            TreasuryEvent::WithdrawalApproved(_) => "treasury-withdrawal-approved",
            TreasuryEvent::WithdrawalExecuted(_) => "treasury-withdrawal-executed",
            TreasuryEvent::WithdrawalCancelled(_) => "treasury-withdrawal-cancelled",
            TreasuryEvent::AdminAdded(_) => "treasury-admin-added",
            TreasuryEvent::AdminRemoved(_) => "treasury-admin-removed",
            TreasuryEvent::ThresholdUpdated(_) => "treasury-threshold-updated",
        }
    }
}
