//! Obligation and receipt NFT events

use super::{DomainEvent, Fields};
use crate::chainhook::NativeAssetEvent;
use crate::core::{DecodeError, Domain};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObligationMinted {
    pub token_id: u128,
    pub recipient: String,
    pub stream_id: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObligationTransferred {
    pub token_id: u128,
    pub sender: String,
    pub recipient: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptMinted {
    pub token_id: u128,
    pub owner: String,
    pub stream_id: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBurned {
    pub token_id: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NftEvent {
    ObligationMinted(ObligationMinted),
    ObligationTransferred(ObligationTransferred),
    ObligationBurned(TokenBurned),
    ReceiptMinted(ReceiptMinted),
    ReceiptBurned(TokenBurned),
    /// Native mint, transfer or burn recorded by the chain. Not projected yet.
    NativeAsset(NativeAssetEvent),
}

impl DomainEvent for NftEvent {
    const DOMAIN: Domain = Domain::Nft;

    const TAGS: &'static [&'static str] = &[
        "obligation-minted",
        "obligation-transferred",
        "obligation-burned",
        "receipt-minted",
        "receipt-burned",
    ];

    fn decode(tag: &str, f: &Fields<'_>) -> Result<Self, DecodeError> {
        let event = match tag {
            "obligation-minted" => NftEvent::ObligationMinted(ObligationMinted {
                token_id: f.uint("token-id")?,
                recipient: f.principal("recipient")?,
                stream_id: f.opt_uint("stream-id")?,
            }),
            "obligation-transferred" => NftEvent::ObligationTransferred(ObligationTransferred {
                token_id: f.uint("token-id")?,
                sender: f.principal("sender")?,
                recipient: f.principal("recipient")?,
            }),
            "obligation-burned" => NftEvent::ObligationBurned(TokenBurned {
                token_id: f.uint("token-id")?,
            }),
            "receipt-minted" => NftEvent::ReceiptMinted(ReceiptMinted {
                token_id: f.uint("token-id")?,
                owner: f.principal("owner")?,
                stream_id: f.opt_uint("stream-id")?,
            }),
            "receipt-burned" => NftEvent::ReceiptBurned(TokenBurned {
                token_id: f.uint("token-id")?,
            }),
            other => return Err(DecodeError::UnknownTag(other.to_string())),
        };
        Ok(event)
    }

    fn tag(&self) -> &'static str {
        match self {
            NftEvent::ObligationMinted(_) => "obligation-minted",
            NftEvent::ObligationTransferred(_) => "obligation-transferred",
            NftEvent::ObligationBurned(_) => "obligation-burned",
            NftEvent::ReceiptMinted(_) => "receipt-minted",
            NftEvent::ReceiptBurned(_) => "receipt-burned",
            NftEvent::NativeAsset(_) => "native-asset",
        }
    }

    fn from_native(event: &NativeAssetEvent) -> Option<Self> {
        match event {
            NativeAssetEvent::NftMint { .. }
            | NativeAssetEvent::NftTransfer { .. }
            | NativeAssetEvent::NftBurn { .. } => Some(NftEvent::NativeAsset(event.clone())),
            NativeAssetEvent::Fungible { .. } => None,
        }
    }
}
