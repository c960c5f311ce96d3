//! Typed shape of a Chainhook webhook delivery
//!
//! Deserializing into these types is the structural half of the payload gate:
//! anything that does not fit is rejected before any processing starts.

use crate::clarity::ClarityValue;
use crate::core::BlockRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use tracing::debug;

/// One webhook delivery
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Batch {
    #[serde(default)]
    pub apply: Vec<Block>,
    #[serde(default)]
    pub rollback: Vec<Block>,
    #[serde(default)]
    pub chainhook: Option<ChainhookInfo>,
}

impl Batch {
    /// Delivery identifier, when the notifier sent one
    pub fn delivery_id(&self) -> &str {
        self.chainhook
            .as_ref()
            .map(|c| c.uuid.as_str())
            .unwrap_or("unidentified")
    }

    pub fn is_empty(&self) -> bool {
        self.apply.is_empty() && self.rollback.is_empty()
    }
}

/// Predicate information attached to a delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainhookInfo {
    pub uuid: String,
    #[serde(default)]
    pub is_streaming_blocks: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockIdentifier {
    pub index: u64,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub block_identifier: BlockIdentifier,
    #[serde(default)]
    pub parent_block_identifier: Option<BlockIdentifier>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn block_ref(&self) -> BlockRef {
        BlockRef {
            index: self.block_identifier.index,
            hash: self.block_identifier.hash.clone(),
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionIdentifier {
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_identifier: TransactionIdentifier,
    pub metadata: TransactionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub success: bool,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub receipt: Receipt,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

/// Untyped event record as emitted in a transaction receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub position: Option<EventPosition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPosition {
    pub index: usize,
}

/// A raw record narrowed to what the walker cares about
#[derive(Debug, Clone, PartialEq)]
pub enum EventRecord<'a> {
    Print(PrintEvent<'a>),
    Native(NativeAssetEvent),
    Other,
}

/// Application-level `print` emitted by contract logic
#[derive(Debug, Clone, PartialEq)]
pub struct PrintEvent<'a> {
    pub contract_identifier: &'a str,
    pub value: Cow<'a, Value>,
}

/// Native asset movement recorded by the chain itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeAssetEvent {
    NftMint {
        asset_class_identifier: String,
        asset_identifier: String,
        recipient: String,
    },
    NftTransfer {
        asset_class_identifier: String,
        asset_identifier: String,
        sender: String,
        recipient: String,
    },
    NftBurn {
        asset_class_identifier: String,
        asset_identifier: String,
        sender: String,
    },
    /// STX and fungible-token movements
    Fungible { kind: String },
}

fn text(data: &Value, field: &str) -> String {
    data.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl RawEvent {
    pub fn contract_identifier(&self) -> Option<&str> {
        self.data.get("contract_identifier").and_then(Value::as_str)
    }

    /// Narrow the record by its kind tag
    pub fn classify(&self) -> EventRecord<'_> {
        match self.kind.as_str() {
            "SmartContractEvent" => self.print_event().map(EventRecord::Print).unwrap_or(EventRecord::Other),
            "NFTMintEvent" => EventRecord::Native(NativeAssetEvent::NftMint {
                asset_class_identifier: text(&self.data, "asset_class_identifier"),
                asset_identifier: text(&self.data, "asset_identifier"),
                recipient: text(&self.data, "recipient"),
            }),
            "NFTTransferEvent" => EventRecord::Native(NativeAssetEvent::NftTransfer {
                asset_class_identifier: text(&self.data, "asset_class_identifier"),
                asset_identifier: text(&self.data, "asset_identifier"),
                sender: text(&self.data, "sender"),
                recipient: text(&self.data, "recipient"),
            }),
            "NFTBurnEvent" => EventRecord::Native(NativeAssetEvent::NftBurn {
                asset_class_identifier: text(&self.data, "asset_class_identifier"),
                asset_identifier: text(&self.data, "asset_identifier"),
                sender: text(&self.data, "sender"),
            }),
            kind if kind.starts_with("STX") || kind.starts_with("FT") => {
                EventRecord::Native(NativeAssetEvent::Fungible {
                    kind: kind.to_string(),
                })
            }
            _ => EventRecord::Other,
        }
    }

    fn print_event(&self) -> Option<PrintEvent<'_>> {
        if self.data.get("topic").and_then(Value::as_str) != Some("print") {
            return None;
        }
        let contract_identifier = self.contract_identifier().unwrap_or_default();

        let value = match self.data.get("value") {
            Some(value) if !value.is_null() => Cow::Borrowed(value),
            _ => {
                let raw = self.data.get("raw_value").and_then(Value::as_str)?;
                match ClarityValue::from_hex(raw) {
                    Ok(decoded) => Cow::Owned(decoded.to_json()),
                    Err(e) => {
                        debug!(contract = contract_identifier, error = %e, "undecodable raw print value");
                        return None;
                    }
                }
            }
        };

        Some(PrintEvent {
            contract_identifier,
            value,
        })
    }
}
