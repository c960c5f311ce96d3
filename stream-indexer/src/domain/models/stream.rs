//! Payment stream documents

use super::{amount, Document};
use crate::core::Collection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Active,
    Paused,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stream {
    #[serde(with = "amount")]
    pub stream_id: u128,
    pub sender: String,
    pub recipient: String,
    pub token: Option<String>,
    /// Everything ever deposited, refuels included
    #[serde(with = "amount")]
    pub deposited: u128,
    /// Amount still held by the stream contract
    #[serde(with = "amount")]
    pub balance: u128,
    #[serde(with = "amount")]
    pub withdrawn: u128,
    #[serde(with = "amount")]
    pub rate_per_block: u128,
    pub start_block: u64,
    pub end_block: u64,
    pub status: StreamStatus,
    #[serde(with = "amount::option", default)]
    pub sender_refund: Option<u128>,
    #[serde(with = "amount::option", default)]
    pub recipient_payout: Option<u128>,
    pub created_at_block: u64,
    pub created_tx: String,
    pub updated_at_block: u64,
}

impl Stream {
    pub fn key_for(stream_id: u128) -> String {
        stream_id.to_string()
    }

    pub fn channel(&self) -> String {
        super::stream_channel(self.stream_id)
    }

    pub fn record_withdrawal(&mut self, amount: u128, height: u64) {
        self.balance = self.balance.saturating_sub(amount);
        self.withdrawn = self.withdrawn.saturating_add(amount);
        self.updated_at_block = height;
    }

    pub fn record_refuel(&mut self, amount: u128, height: u64) {
        self.balance = self.balance.saturating_add(amount);
        self.deposited = self.deposited.saturating_add(amount);
        self.updated_at_block = height;
    }
}

impl Document for Stream {
    const COLLECTION: Collection = Collection::Streams;

    fn key(&self) -> String {
        Self::key_for(self.stream_id)
    }
}

/// Ledger row for one recipient withdrawal, keyed by the emitting event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamWithdrawalRecord {
    pub event_key: String,
    #[serde(with = "amount")]
    pub stream_id: u128,
    pub recipient: String,
    #[serde(with = "amount")]
    pub amount: u128,
    pub block_height: u64,
    pub tx_hash: String,
}

impl Document for StreamWithdrawalRecord {
    const COLLECTION: Collection = Collection::StreamWithdrawals;

    fn key(&self) -> String {
        self.event_key.clone()
    }
}
