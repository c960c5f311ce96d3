//! Marketplace processor

use super::DomainProcessor;
use crate::adapters::fanout::FanOut;
use crate::adapters::storage::Projection;
use crate::core::{
    Domain, HandleOutcome, IndexerResult, OwnershipView, ProcessingContext, UNKNOWN_PRINCIPAL,
};
use crate::domain::events::{
    DomainEvent, ListingCancelled, ListingPriceUpdated, MarketplaceEvent, NftListed, NftSold,
    PurchaseCompleted, PurchaseExpired, PurchaseInitiated,
};
use crate::domain::models::{
    Listing, ListingStatus, NotificationDraft, PendingPurchase, Priority, PurchaseStatus, RealtimeEvent,
    MARKETPLACE_TOPIC,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

const DOMAIN: Domain = Domain::Marketplace;

pub struct MarketplaceProcessor {
    projection: Projection,
    ownership: Arc<dyn OwnershipView>,
    fanout: FanOut,
}

impl MarketplaceProcessor {
    pub fn new(projection: Projection, ownership: Arc<dyn OwnershipView>, fanout: FanOut) -> Self {
        Self {
            projection,
            ownership,
            fanout,
        }
    }

    async fn announce(&self, event: &str, context: &ProcessingContext, payload: serde_json::Value) {
        self.fanout
            .broadcast(RealtimeEvent::new(MARKETPLACE_TOPIC, event, payload).at(context))
            .await;
    }

    async fn notify(&self, user: &str, draft: NotificationDraft, context: &ProcessingContext) {
        self.fanout.notify(DOMAIN, user, draft, Some(context)).await;
    }

    /// Seller of a token, from its open listing or current owner
    ///
    /// A sold or cancelled listing names a past seller, so it is skipped.
    async fn resolve_seller(&self, stream_id: u128) -> IndexerResult<String> {
        if let Some(listing) = self.ownership.listing_by_token_id(stream_id).await? {
            if listing.status.is_open() {
                return Ok(listing.seller);
            }
            debug!(stream_id = %stream_id, status = ?listing.status, "listing closed, resolving seller by owner");
        }
        if let Some(owner) = self.ownership.owner_by_token_id(stream_id).await? {
            return Ok(owner);
        }
        warn!(stream_id = %stream_id, "no listing or owner found, seller unknown");
        Ok(UNKNOWN_PRINCIPAL.to_string())
    }

    async fn listed(&self, e: NftListed, context: &ProcessingContext) -> IndexerResult<()> {
        let height = context.block_height();
        let listing = Listing {
            stream_id: e.stream_id,
            seller: e.seller.clone(),
            price: e.price,
            status: ListingStatus::Active,
            expiry_block: e.expiry_block,
            buyer: None,
            marketplace_fee: None,
            listed_at_block: height,
            updated_at_block: height,
        };
        self.projection.upsert(DOMAIN, &context.scope(), &listing).await?;

        self.notify(
            &e.seller,
            NotificationDraft::new(
                "NFT listed",
                format!("Stream #{} is listed for {}", e.stream_id, e.price),
            )
            .action_url(format!("/marketplace/{}", e.stream_id)),
            context,
        )
        .await;
        self.announce("listing-created", context, serde_json::to_value(&listing)?)
            .await;
        Ok(())
    }

    async fn listing_cancelled(&self, e: ListingCancelled, context: &ProcessingContext) -> IndexerResult<()> {
        match self.ownership.listing_by_token_id(e.stream_id).await? {
            Some(mut listing) => {
                listing.status = ListingStatus::Cancelled;
                listing.updated_at_block = context.block_height();
                self.projection.upsert(DOMAIN, &context.scope(), &listing).await?;
            }
            None => warn!(stream_id = %e.stream_id, "cancelling unknown listing"),
        }

        self.notify(
            &e.seller,
            NotificationDraft::new("Listing cancelled", format!("Stream #{} is no longer listed", e.stream_id)),
            context,
        )
        .await;
        self.announce(
            "listing-cancelled",
            context,
            json!({ "stream_id": e.stream_id.to_string(), "seller": e.seller }),
        )
        .await;
        Ok(())
    }

    async fn price_updated(&self, e: ListingPriceUpdated, context: &ProcessingContext) -> IndexerResult<()> {
        let previous = match self.ownership.listing_by_token_id(e.stream_id).await? {
            Some(mut listing) => {
                let previous = listing.price;
                listing.price = e.price;
                listing.updated_at_block = context.block_height();
                self.projection.upsert(DOMAIN, &context.scope(), &listing).await?;
                Some(previous)
            }
            None => {
                warn!(stream_id = %e.stream_id, "price update for unknown listing");
                None
            }
        };

        self.notify(
            &e.seller,
            NotificationDraft::new(
                "Listing price updated",
                format!("Stream #{} is now listed for {}", e.stream_id, e.price),
            )
            .priority(Priority::Low),
            context,
        )
        .await;
        self.announce(
            "listing-price-updated",
            context,
            json!({
                "stream_id": e.stream_id.to_string(),
                "price": e.price.to_string(),
                "previous_price": previous.map(|p| p.to_string()),
            }),
        )
        .await;
        Ok(())
    }

    async fn sold(&self, e: NftSold, context: &ProcessingContext) -> IndexerResult<()> {
        let height = context.block_height();
        let mut listing = self
            .ownership
            .listing_by_token_id(e.stream_id)
            .await?
            .unwrap_or_else(|| Listing {
                stream_id: e.stream_id,
                seller: e.seller.clone(),
                price: e.price,
                status: ListingStatus::Active,
                expiry_block: None,
                buyer: None,
                marketplace_fee: None,
                listed_at_block: height,
                updated_at_block: height,
            });
        listing.seller = e.seller.clone();
        listing.price = e.price;
        listing.status = ListingStatus::Sold;
        listing.buyer = Some(e.buyer.clone());
        listing.marketplace_fee = e.marketplace_fee;
        listing.updated_at_block = height;
        self.projection.upsert(DOMAIN, &context.scope(), &listing).await?;

        self.notify(
            &e.seller,
            NotificationDraft::new("NFT sold", format!("Stream #{} sold to {} for {}", e.stream_id, e.buyer, e.price))
                .priority(Priority::High),
            context,
        )
        .await;
        self.notify(
            &e.buyer,
            NotificationDraft::new("Purchase complete", format!("You bought stream #{} for {}", e.stream_id, e.price))
                .action_url(format!("/streams/{}", e.stream_id)),
            context,
        )
        .await;
        self.announce("listing-sold", context, serde_json::to_value(&listing)?).await;
        Ok(())
    }

    async fn purchase_initiated(&self, e: PurchaseInitiated, context: &ProcessingContext) -> IndexerResult<()> {
        let height = context.block_height();
        let seller = self.resolve_seller(e.stream_id).await?;
        let purchase = PendingPurchase {
            stream_id: e.stream_id,
            buyer: e.buyer.clone(),
            seller: seller.clone(),
            price: e.price,
            expiry_block: e.expiry_block,
            status: PurchaseStatus::Pending,
            payment_status: None,
            payment_reference: None,
            initiated_at_block: height,
            updated_at_block: height,
        };
        self.projection.upsert(DOMAIN, &context.scope(), &purchase).await?;

        if let Some(mut listing) = self.ownership.listing_by_token_id(e.stream_id).await? {
            if listing.status == ListingStatus::Active {
                listing.status = ListingStatus::Pending;
                listing.updated_at_block = height;
                self.projection.upsert(DOMAIN, &context.scope(), &listing).await?;
            }
        }

        self.notify(
            &e.buyer,
            NotificationDraft::new(
                "Purchase started",
                format!("Your purchase of stream #{} for {} is pending", e.stream_id, e.price),
            ),
            context,
        )
        .await;
        self.notify(
            &seller,
            NotificationDraft::new(
                "Purchase started",
                format!("{} started buying stream #{} for {}", e.buyer, e.stream_id, e.price),
            ),
            context,
        )
        .await;
        self.announce("purchase-initiated", context, serde_json::to_value(&purchase)?)
            .await;
        Ok(())
    }

    async fn purchase_completed(&self, e: PurchaseCompleted, context: &ProcessingContext) -> IndexerResult<()> {
        let height = context.block_height();
        let key = PendingPurchase::key_for(e.stream_id, &e.buyer);
        let existing = self.projection.get::<PendingPurchase>(&key).await?;

        let seller = match (&e.seller, &existing) {
            (Some(seller), _) => seller.clone(),
            (None, Some(purchase)) if purchase.seller != UNKNOWN_PRINCIPAL => purchase.seller.clone(),
            _ => self.resolve_seller(e.stream_id).await?,
        };

        let mut purchase = existing.unwrap_or_else(|| PendingPurchase {
            stream_id: e.stream_id,
            buyer: e.buyer.clone(),
            seller: seller.clone(),
            price: e.price,
            expiry_block: None,
            status: PurchaseStatus::Pending,
            payment_status: None,
            payment_reference: None,
            initiated_at_block: height,
            updated_at_block: height,
        });
        purchase.seller = seller.clone();
        purchase.price = e.price;
        purchase.status = PurchaseStatus::Completed;
        purchase.updated_at_block = height;
        self.projection.upsert(DOMAIN, &context.scope(), &purchase).await?;

        if let Some(mut listing) = self.ownership.listing_by_token_id(e.stream_id).await? {
            listing.status = ListingStatus::Sold;
            listing.buyer = Some(e.buyer.clone());
            listing.price = e.price;
            listing.updated_at_block = height;
            self.projection.upsert(DOMAIN, &context.scope(), &listing).await?;
        }

        self.notify(
            &e.buyer,
            NotificationDraft::new("Purchase complete", format!("You bought stream #{} for {}", e.stream_id, e.price))
                .priority(Priority::High)
                .action_url(format!("/streams/{}", e.stream_id)),
            context,
        )
        .await;
        self.notify(
            &seller,
            NotificationDraft::new("NFT sold", format!("Stream #{} sold to {} for {}", e.stream_id, e.buyer, e.price))
                .priority(Priority::High),
            context,
        )
        .await;
        self.announce("purchase-completed", context, serde_json::to_value(&purchase)?)
            .await;
        Ok(())
    }

    async fn purchase_expired(&self, e: PurchaseExpired, context: &ProcessingContext) -> IndexerResult<()> {
        let height = context.block_height();
        let key = PendingPurchase::key_for(e.stream_id, &e.buyer);

        let seller = match self.projection.get::<PendingPurchase>(&key).await? {
            Some(mut purchase) => {
                purchase.status = PurchaseStatus::Expired;
                purchase.updated_at_block = height;
                self.projection.upsert(DOMAIN, &context.scope(), &purchase).await?;
                purchase.seller
            }
            None => {
                warn!(stream_id = %e.stream_id, buyer = %e.buyer, "expiring unknown purchase");
                UNKNOWN_PRINCIPAL.to_string()
            }
        };

        let seller = match self.ownership.listing_by_token_id(e.stream_id).await? {
            Some(mut listing) => {
                if listing.status == ListingStatus::Pending {
                    listing.status = ListingStatus::Active;
                    listing.updated_at_block = height;
                    self.projection.upsert(DOMAIN, &context.scope(), &listing).await?;
                }
                if seller == UNKNOWN_PRINCIPAL {
                    listing.seller
                } else {
                    seller
                }
            }
            None => seller,
        };

        self.notify(
            &e.buyer,
            NotificationDraft::new("Purchase expired", format!("Your purchase of stream #{} expired", e.stream_id)),
            context,
        )
        .await;
        self.notify(
            &seller,
            NotificationDraft::new(
                "Purchase expired",
                format!("The pending purchase of stream #{} by {} expired", e.stream_id, e.buyer),
            )
            .priority(Priority::Low),
            context,
        )
        .await;
        self.announce(
            "purchase-expired",
            context,
            json!({ "stream_id": e.stream_id.to_string(), "buyer": e.buyer, "seller": seller }),
        )
        .await;
        Ok(())
    }
}

#[async_trait]
impl DomainProcessor for MarketplaceProcessor {
    type Event = MarketplaceEvent;

    async fn handle(&self, event: MarketplaceEvent, context: &ProcessingContext) -> IndexerResult<HandleOutcome> {
        if !self.projection.claim(DOMAIN, context).await? {
            return Ok(HandleOutcome::Duplicate);
        }
        debug!(event = %event.tag(), tx = %context.tx_hash, "applying marketplace event");

        match event {
            MarketplaceEvent::Listed(e) => self.listed(e, context).await?,
            MarketplaceEvent::ListingCancelled(e) => self.listing_cancelled(e, context).await?,
            MarketplaceEvent::PriceUpdated(e) => self.price_updated(e, context).await?,
            MarketplaceEvent::Sold(e) => self.sold(e, context).await?,
            MarketplaceEvent::PurchaseInitiated(e) => self.purchase_initiated(e, context).await?,
            MarketplaceEvent::PurchaseCompleted(e) => self.purchase_completed(e, context).await?,
            MarketplaceEvent::PurchaseExpired(e) => self.purchase_expired(e, context).await?,
        }
        Ok(HandleOutcome::Applied)
    }
}
