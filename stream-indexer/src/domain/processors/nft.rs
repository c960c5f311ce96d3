//! Obligation and receipt NFT processor

use super::DomainProcessor;
use crate::adapters::fanout::FanOut;
use crate::adapters::storage::Projection;
use crate::chainhook::NativeAssetEvent;
use crate::core::{Domain, HandleOutcome, IndexerResult, OwnershipView, ProcessingContext};
use crate::domain::events::{DomainEvent, NftEvent, ObligationMinted, ObligationTransferred, ReceiptMinted};
use crate::domain::models::{
    NftKind, NftRecord, NotificationDraft, Priority, RealtimeEvent, MARKETPLACE_TOPIC,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

const DOMAIN: Domain = Domain::Nft;

pub struct NftProcessor {
    projection: Projection,
    ownership: Arc<dyn OwnershipView>,
    fanout: FanOut,
}

impl NftProcessor {
    pub fn new(projection: Projection, ownership: Arc<dyn OwnershipView>, fanout: FanOut) -> Self {
        Self {
            projection,
            ownership,
            fanout,
        }
    }

    async fn mint(
        &self,
        kind: NftKind,
        token_id: u128,
        owner: &str,
        stream_id: Option<u128>,
        context: &ProcessingContext,
    ) -> IndexerResult<()> {
        let height = context.block_height();
        let record = NftRecord {
            kind,
            token_id,
            owner: owner.to_string(),
            stream_id,
            burned: false,
            minted_at_block: height,
            updated_at_block: height,
        };
        self.projection.upsert(DOMAIN, &context.scope(), &record).await?;

        let title = match kind {
            NftKind::Obligation => "Obligation NFT minted",
            NftKind::Receipt => "Receipt NFT minted",
        };
        let body = match stream_id {
            Some(stream_id) => format!("You received {} #{} for stream #{}", kind, token_id, stream_id),
            None => format!("You received {} #{}", kind, token_id),
        };
        self.fanout
            .notify(DOMAIN, owner, NotificationDraft::new(title, body), Some(context))
            .await;
        Ok(())
    }

    async fn obligation_minted(&self, e: ObligationMinted, context: &ProcessingContext) -> IndexerResult<()> {
        self.mint(NftKind::Obligation, e.token_id, &e.recipient, e.stream_id, context)
            .await
    }

    async fn receipt_minted(&self, e: ReceiptMinted, context: &ProcessingContext) -> IndexerResult<()> {
        self.mint(NftKind::Receipt, e.token_id, &e.owner, e.stream_id, context)
            .await
    }

    async fn obligation_transferred(&self, e: ObligationTransferred, context: &ProcessingContext) -> IndexerResult<()> {
        let height = context.block_height();
        let key = NftRecord::key_for(NftKind::Obligation, e.token_id);

        let mut record = self.projection.get::<NftRecord>(&key).await?.unwrap_or_else(|| {
            warn!(token_id = %e.token_id, "transfer of untracked obligation");
            NftRecord {
                kind: NftKind::Obligation,
                token_id: e.token_id,
                owner: e.sender.clone(),
                stream_id: None,
                burned: false,
                minted_at_block: height,
                updated_at_block: height,
            }
        });
        record.owner = e.recipient.clone();
        record.updated_at_block = height;
        self.projection.upsert(DOMAIN, &context.scope(), &record).await?;

        // An open listing follows the token to its new owner
        if let Some(mut listing) = self.ownership.listing_by_token_id(e.token_id).await? {
            if listing.status.is_open() && listing.seller != e.recipient {
                debug!(token_id = %e.token_id, from = %listing.seller, to = %e.recipient, "moving listing seller");
                listing.seller = e.recipient.clone();
                listing.updated_at_block = height;
                self.projection.upsert(DOMAIN, &context.scope(), &listing).await?;
                self.fanout
                    .broadcast(
                        RealtimeEvent::new(
                            MARKETPLACE_TOPIC,
                            "listing-seller-updated",
                            json!({ "stream_id": e.token_id.to_string(), "seller": e.recipient }),
                        )
                        .at(context),
                    )
                    .await;
            }
        }

        self.fanout
            .notify(
                DOMAIN,
                &e.sender,
                NotificationDraft::new(
                    "Obligation transferred",
                    format!("Obligation #{} was transferred to {}", e.token_id, e.recipient),
                )
                .priority(Priority::Low),
                Some(context),
            )
            .await;
        self.fanout
            .notify(
                DOMAIN,
                &e.recipient,
                NotificationDraft::new(
                    "Obligation received",
                    format!("You received obligation #{} from {}", e.token_id, e.sender),
                )
                .priority(Priority::High),
                Some(context),
            )
            .await;
        Ok(())
    }

    async fn burned(&self, kind: NftKind, token_id: u128, context: &ProcessingContext) -> IndexerResult<()> {
        let key = NftRecord::key_for(kind, token_id);
        match self.projection.get::<NftRecord>(&key).await? {
            Some(mut record) => {
                record.burned = true;
                record.updated_at_block = context.block_height();
                self.projection.upsert(DOMAIN, &context.scope(), &record).await?;
                self.fanout
                    .notify(
                        DOMAIN,
                        &record.owner,
                        NotificationDraft::new("NFT burned", format!("Your {} #{} was burned", kind, token_id))
                            .priority(Priority::Low),
                        Some(context),
                    )
                    .await;
            }
            None => warn!(%kind, token_id = %token_id, "burn of untracked token"),
        }
        Ok(())
    }

    fn native_asset(&self, event: &NativeAssetEvent, context: &ProcessingContext) -> HandleOutcome {
        warn!(
            block = context.block_height(),
            tx = %context.tx_hash,
            event = ?event,
            "native NFT event has no projection yet"
        );
        HandleOutcome::Unimplemented
    }
}

#[async_trait]
impl DomainProcessor for NftProcessor {
    type Event = NftEvent;

    async fn handle(&self, event: NftEvent, context: &ProcessingContext) -> IndexerResult<HandleOutcome> {
        if let NftEvent::NativeAsset(native) = &event {
            return Ok(self.native_asset(native, context));
        }
        if !self.projection.claim(DOMAIN, context).await? {
            return Ok(HandleOutcome::Duplicate);
        }
        debug!(event = %event.tag(), tx = %context.tx_hash, "applying nft event");

        match event {
            NftEvent::ObligationMinted(e) => self.obligation_minted(e, context).await?,
            NftEvent::ObligationTransferred(e) => self.obligation_transferred(e, context).await?,
            NftEvent::ObligationBurned(e) => self.burned(NftKind::Obligation, e.token_id, context).await?,
            NftEvent::ReceiptMinted(e) => self.receipt_minted(e, context).await?,
            NftEvent::ReceiptBurned(e) => self.burned(NftKind::Receipt, e.token_id, context).await?,
            NftEvent::NativeAsset(native) => return Ok(self.native_asset(&native, context)),
        }
        Ok(HandleOutcome::Applied)
    }
}
