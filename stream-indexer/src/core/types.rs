//! Core domain types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Business domain an event, endpoint or journal entry belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    Streams,
    Marketplace,
    Nft,
    Treasury,
    AccessControl,
    Payments,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Streams => "streams",
            Domain::Marketplace => "marketplace",
            Domain::Nft => "nft",
            Domain::Treasury => "treasury",
            Domain::AccessControl => "access-control",
            Domain::Payments => "payments",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        [
            Domain::Streams,
            Domain::Marketplace,
            Domain::Nft,
            Domain::Treasury,
            Domain::AccessControl,
            Domain::Payments,
        ]
        .into_iter()
        .find(|d| d.as_str() == name)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named collections of the projection store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Streams,
    StreamWithdrawals,
    Listings,
    PendingPurchases,
    Nfts,
    TreasuryFees,
    TreasuryWithdrawals,
    Proposals,
    TreasuryStats,
    SystemStatus,
    Roles,
    Notifications,
    EventReceipts,
    PaymentEvents,
}

impl Collection {
    pub const ALL: [Collection; 14] = [
        Collection::Streams,
        Collection::StreamWithdrawals,
        Collection::Listings,
        Collection::PendingPurchases,
        Collection::Nfts,
        Collection::TreasuryFees,
        Collection::TreasuryWithdrawals,
        Collection::Proposals,
        Collection::TreasuryStats,
        Collection::SystemStatus,
        Collection::Roles,
        Collection::Notifications,
        Collection::EventReceipts,
        Collection::PaymentEvents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Streams => "streams",
            Collection::StreamWithdrawals => "stream_withdrawals",
            Collection::Listings => "listings",
            Collection::PendingPurchases => "pending_purchases",
            Collection::Nfts => "nfts",
            Collection::TreasuryFees => "treasury_fees",
            Collection::TreasuryWithdrawals => "treasury_withdrawals",
            Collection::Proposals => "proposals",
            Collection::TreasuryStats => "treasury_stats",
            Collection::SystemStatus => "system_status",
            Collection::Roles => "roles",
            Collection::Notifications => "notifications",
            Collection::EventReceipts => "event_receipts",
            Collection::PaymentEvents => "payment_events",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one block as delivered by the notifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockRef {
    pub index: u64,
    pub hash: String,
    pub timestamp: Option<i64>,
}

impl BlockRef {
    pub fn new(index: u64, hash: impl Into<String>) -> Self {
        Self {
            index,
            hash: hash.into(),
            timestamp: None,
        }
    }
}

/// Processing context attached to every decoded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingContext {
    pub block: BlockRef,
    pub tx_hash: String,
    pub tx_index: usize,
    pub event_index: usize,
    pub contract_identifier: String,
}

impl ProcessingContext {
    pub fn block_height(&self) -> u64 {
        self.block.index
    }

    /// Natural key of the event inside the chain history
    pub fn event_key(&self) -> String {
        format!("{}:{}", self.tx_hash, self.event_index)
    }

    pub fn scope(&self) -> WriteScope {
        WriteScope::Block(self.block.clone())
    }

    #[cfg(test)]
    pub fn test(height: u64) -> Self {
        Self {
            block: BlockRef::new(height, format!("0xblock{}", height)),
            tx_hash: format!("0xtx{}", height),
            tx_index: 0,
            event_index: 0,
            contract_identifier: "SP000000000000000000002Q6VF78.test".to_string(),
        }
    }
}

/// Where a projection write originates, which decides whether it is journaled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteScope {
    /// Write derived from a block; reverted if that block is rolled back
    Block(BlockRef),
    /// Write derived from an off-chain callback; never reverted
    OffChain,
}

/// One replaced document, kept so a rolled back block can be reverted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub seq: u64,
    pub collection: Collection,
    pub key: String,
    pub previous: Option<Value>,
}

/// Result of handling one decoded event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// First application of the event
    Applied,
    /// Event was already applied by an earlier delivery
    Duplicate,
    /// Event shape is recognized but has no projection yet
    Unimplemented,
}

impl HandleOutcome {
    pub fn counts_as_processed(&self) -> bool {
        matches!(self, HandleOutcome::Applied | HandleOutcome::Duplicate)
    }
}

/// Sentinel used when a related party cannot be resolved
pub const UNKNOWN_PRINCIPAL: &str = "unknown";
