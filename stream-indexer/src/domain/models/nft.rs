//! Obligation and receipt NFT documents

use super::{amount, Document};
use crate::core::Collection;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NftKind {
    /// Right to the recipient side of a stream; tradable on the marketplace
    Obligation,
    /// Proof of the sender side of a stream
    Receipt,
}

impl fmt::Display for NftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NftKind::Obligation => f.write_str("obligation"),
            NftKind::Receipt => f.write_str("receipt"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NftRecord {
    pub kind: NftKind,
    #[serde(with = "amount")]
    pub token_id: u128,
    pub owner: String,
    #[serde(with = "amount::option", default)]
    pub stream_id: Option<u128>,
    pub burned: bool,
    pub minted_at_block: u64,
    pub updated_at_block: u64,
}

impl NftRecord {
    pub fn key_for(kind: NftKind, token_id: u128) -> String {
        format!("{}:{}", kind, token_id)
    }
}

impl Document for NftRecord {
    const COLLECTION: Collection = Collection::Nfts;

    fn key(&self) -> String {
        Self::key_for(self.kind, self.token_id)
    }
}
