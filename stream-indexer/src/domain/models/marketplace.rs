//! Marketplace listing and purchase documents

use super::{amount, Document};
use crate::core::Collection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    /// A purchase has been initiated and awaits completion
    Pending,
    Sold,
    Cancelled,
}

impl ListingStatus {
    /// Whether the listing still belongs to its seller's open offers
    pub fn is_open(&self) -> bool {
        matches!(self, ListingStatus::Active | ListingStatus::Pending)
    }
}

/// Listing of a stream obligation NFT, keyed by stream (token) id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    #[serde(with = "amount")]
    pub stream_id: u128,
    pub seller: String,
    #[serde(with = "amount")]
    pub price: u128,
    pub status: ListingStatus,
    pub expiry_block: Option<u64>,
    pub buyer: Option<String>,
    #[serde(with = "amount::option", default)]
    pub marketplace_fee: Option<u128>,
    pub listed_at_block: u64,
    pub updated_at_block: u64,
}

impl Listing {
    pub fn key_for(stream_id: u128) -> String {
        stream_id.to_string()
    }
}

impl Document for Listing {
    const COLLECTION: Collection = Collection::Listings;

    fn key(&self) -> String {
        Self::key_for(self.stream_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Expired,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Succeeded,
    Failed,
    Refunded,
}

/// Two-step purchase, keyed by `stream_id:buyer`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingPurchase {
    #[serde(with = "amount")]
    pub stream_id: u128,
    pub buyer: String,
    pub seller: String,
    #[serde(with = "amount")]
    pub price: u128,
    pub expiry_block: Option<u64>,
    pub status: PurchaseStatus,
    pub payment_status: Option<PaymentStatus>,
    pub payment_reference: Option<String>,
    pub initiated_at_block: u64,
    pub updated_at_block: u64,
}

impl PendingPurchase {
    pub fn key_for(stream_id: u128, buyer: &str) -> String {
        format!("{}:{}", stream_id, buyer)
    }
}

impl Document for PendingPurchase {
    const COLLECTION: Collection = Collection::PendingPurchases;

    fn key(&self) -> String {
        Self::key_for(self.stream_id, &self.buyer)
    }
}
