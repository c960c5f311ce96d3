//! Marketplace events for listed stream obligations

use super::{DomainEvent, Fields};
use crate::core::{DecodeError, Domain};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftListed {
    pub stream_id: u128,
    pub seller: String,
    pub price: u128,
    pub expiry_block: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCancelled {
    pub stream_id: u128,
    pub seller: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPriceUpdated {
    pub stream_id: u128,
    pub seller: String,
    pub price: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftSold {
    pub stream_id: u128,
    pub seller: String,
    pub buyer: String,
    pub price: u128,
    pub marketplace_fee: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseInitiated {
    pub stream_id: u128,
    pub buyer: String,
    pub price: u128,
    pub expiry_block: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseCompleted {
    pub stream_id: u128,
    pub buyer: String,
    pub seller: Option<String>,
    pub price: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseExpired {
    pub stream_id: u128,
    pub buyer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketplaceEvent {
    Listed(NftListed),
    ListingCancelled(ListingCancelled),
    PriceUpdated(ListingPriceUpdated),
    Sold(NftSold),
    PurchaseInitiated(PurchaseInitiated),
    PurchaseCompleted(PurchaseCompleted),
    PurchaseExpired(PurchaseExpired),
}

impl DomainEvent for MarketplaceEvent {
    const DOMAIN: Domain = Domain::Marketplace;

    const TAGS: &'static [&'static str] = &[
        "market-nft-listed",
        "market-listing-cancelled",
        "market-listing-price-updated",
        "market-nft-sold",
        "market-purchase-initiated",
        "market-purchase-completed",
        "market-purchase-expired",
    ];

    fn decode(tag: &str, f: &Fields<'_>) -> Result<Self, DecodeError> {
        let event = match tag {
            "market-nft-listed" => MarketplaceEvent::Listed(NftListed {
                stream_id: f.uint("stream-id")?,
                seller: f.principal("seller")?,
                price: f.uint("price")?,
                expiry_block: f.opt_u64("expiry-block")?,
            }),
            "market-listing-cancelled" => MarketplaceEvent::ListingCancelled(ListingCancelled {
                stream_id: f.uint("stream-id")?,
                seller: f.principal("seller")?,
            }),
            "market-listing-price-updated" => MarketplaceEvent::PriceUpdated(ListingPriceUpdated {
                stream_id: f.uint("stream-id")?,
                seller: f.principal("seller")?,
                price: f.uint("price")?,
            }),
            "market-nft-sold" => MarketplaceEvent::Sold(NftSold {
                stream_id: f.uint("stream-id")?,
                seller: f.principal("seller")?,
                buyer: f.principal("buyer")?,
                price: f.uint("price")?,
                marketplace_fee: f.opt_uint("marketplace-fee")?,
            }),
            "market-purchase-initiated" => MarketplaceEvent::PurchaseInitiated(PurchaseInitiated {
                stream_id: f.uint("stream-id")?,
                buyer: f.principal("buyer")?,
                price: f.uint("price")?,
                expiry_block: f.opt_u64("expiry-block")?,
            }),
            "market-purchase-completed" => MarketplaceEvent::PurchaseCompleted(PurchaseCompleted {
                stream_id: f.uint("stream-id")?,
                buyer: f.principal("buyer")?,
                seller: f.opt_principal("seller")?,
                price: f.uint("price")?,
            }),
            "market-purchase-expired" => MarketplaceEvent::PurchaseExpired(PurchaseExpired {
                stream_id: f.uint("stream-id")?,
                buyer: f.principal("buyer")?,
            }),
            other => return Err(DecodeError::UnknownTag(other.to_string())),
        };
        Ok(event)
    }

    fn tag(&self) -> &'static str {
        match self {
            MarketplaceEvent::Listed(_) => "market-nft-listed",
            MarketplaceEvent::ListingCancelled(_) => "market-listing-cancelled",
            MarketplaceEvent::PriceUpdated(_) => "market-listing-price-updated",
            MarketplaceEvent::Sold(_) => "market-nft-sold",
            MarketplaceEvent::PurchaseInitiated(_) => "market-purchase-initiated",
            MarketplaceEvent::PurchaseCompleted(_) => "market-purchase-completed",
            MarketplaceEvent::PurchaseExpired(_) => "market-purchase-expired",
        }
    }
}
