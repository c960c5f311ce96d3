//! Treasury documents: fee ledger, withdrawal proposals and running totals

use super::{amount, Document};
use crate::core::Collection;
use serde::{Deserialize, Serialize};

/// Fee ledger row, keyed by the emitting event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreasuryFee {
    pub event_key: String,
    #[serde(with = "amount")]
    pub amount: u128,
    pub source: String,
    pub payer: Option<String>,
    #[serde(with = "amount::option", default)]
    pub stream_id: Option<u128>,
    pub block_height: u64,
    pub tx_hash: String,
}

impl Document for TreasuryFee {
    const COLLECTION: Collection = Collection::TreasuryFees;

    fn key(&self) -> String {
        self.event_key.clone()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Proposed,
    Approving,
    Ready,
    Executed,
    Expired,
    Cancelled,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Proposed => "proposed",
            ProposalStatus::Approving => "approving",
            ProposalStatus::Ready => "ready",
            ProposalStatus::Executed => "executed",
            ProposalStatus::Expired => "expired",
            ProposalStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Executed | ProposalStatus::Expired | ProposalStatus::Cancelled
        )
    }

    /// Only proposals still collecting approvals can run out of time
    pub fn can_expire(&self) -> bool {
        matches!(self, ProposalStatus::Proposed | ProposalStatus::Approving)
    }

    /// Status after an approval brought the count to `approvals`
    pub fn after_approval(self, approvals: u64, threshold: u64) -> Self {
        if self.is_terminal() {
            self
        } else if approvals >= threshold {
            ProposalStatus::Ready
        } else {
            ProposalStatus::Approving
        }
    }
}

/// Multi-sig withdrawal proposal, keyed by proposal id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposal {
    #[serde(with = "amount")]
    pub proposal_id: u128,
    pub proposer: String,
    pub recipient: String,
    #[serde(with = "amount")]
    pub amount: u128,
    pub expiry_block: u64,
    pub approvals: u64,
    pub approvers: Vec<String>,
    /// Threshold seen by the most recent approval
    pub threshold: Option<u64>,
    pub status: ProposalStatus,
    pub executed_by: Option<String>,
    pub cancelled_by: Option<String>,
    pub proposed_at_block: u64,
    pub updated_at_block: u64,
}

impl Proposal {
    pub fn key_for(proposal_id: u128) -> String {
        proposal_id.to_string()
    }

    pub fn is_expired_at(&self, height: u64) -> bool {
        self.status.can_expire() && height >= self.expiry_block
    }
}

impl Document for Proposal {
    const COLLECTION: Collection = Collection::Proposals;

    fn key(&self) -> String {
        Self::key_for(self.proposal_id)
    }
}

/// Executed withdrawal, keyed by proposal id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreasuryWithdrawal {
    #[serde(with = "amount")]
    pub proposal_id: u128,
    pub executor: String,
    pub recipient: String,
    #[serde(with = "amount")]
    pub amount: u128,
    pub block_height: u64,
    pub tx_hash: String,
}

impl Document for TreasuryWithdrawal {
    const COLLECTION: Collection = Collection::TreasuryWithdrawals;

    fn key(&self) -> String {
        Proposal::key_for(self.proposal_id)
    }
}

/// Running totals, stored under a single key
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TreasuryStats {
    #[serde(with = "amount")]
    pub total_fees: u128,
    #[serde(with = "amount")]
    pub total_withdrawn: u128,
    pub fee_count: u64,
    pub withdrawal_count: u64,
    pub updated_at_block: u64,
}

impl TreasuryStats {
    pub const KEY: &'static str = "totals";
}

impl Document for TreasuryStats {
    const COLLECTION: Collection = Collection::TreasuryStats;

    fn key(&self) -> String {
        Self::KEY.to_string()
    }
}
