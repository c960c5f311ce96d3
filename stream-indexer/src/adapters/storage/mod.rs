//! Storage adapters
//!
//! `Projection` is the only way handlers touch the store. It turns typed
//! documents into key-scoped writes and journals what every write replaced,
//! so a block can be reverted when the notifier rolls it back.

pub mod memory;
pub mod postgres;

use crate::core::{
    BlockRef, Collection, Domain, IndexerResult, OwnershipView, ProcessingContext, ProjectionStore,
    StorageError, WriteScope,
};
use crate::domain::models::{Document, Listing, NftKind, NftRecord};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Typed, journaling facade over a `ProjectionStore`
#[derive(Clone)]
pub struct Projection {
    store: Arc<dyn ProjectionStore>,
}

impl Projection {
    pub fn new(store: Arc<dyn ProjectionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ProjectionStore> {
        &self.store
    }

    /// Fetch and decode one document
    pub async fn get<D: Document>(&self, key: &str) -> IndexerResult<Option<D>> {
        match self.store.get(D::COLLECTION, key).await? {
            Some(value) => decode::<D>(key, value).map(Some),
            None => Ok(None),
        }
    }

    /// Documents whose top-level `field` equals `value`
    pub async fn find<D: Document>(&self, field: &str, value: Value) -> IndexerResult<Vec<D>> {
        let rows = self.store.find_by(D::COLLECTION, field, &value).await?;
        rows.into_iter()
            .map(|(key, doc)| decode::<D>(&key, doc))
            .collect()
    }

    /// Insert or replace a document by its natural key
    ///
    /// Writes scoped to a block record what they replaced in that block's
    /// journal, under `domain`.
    pub async fn upsert<D: Document>(&self, domain: Domain, scope: &WriteScope, doc: &D) -> IndexerResult<()> {
        let key = doc.key();
        let value = serde_json::to_value(doc)?;
        let previous = self.store.put(D::COLLECTION, &key, value).await?;

        if let WriteScope::Block(block) = scope {
            self.store
                .append_journal(domain, block, D::COLLECTION, &key, previous)
                .await?;
        }

        debug!(%domain, collection = %D::COLLECTION, key = %key, "projection write");
        Ok(())
    }

    /// Insert a document only if its key is new; `true` when this call created it
    pub async fn insert_new<D: Document>(&self, domain: Domain, scope: &WriteScope, doc: &D) -> IndexerResult<bool> {
        let key = doc.key();
        let created = self
            .store
            .insert_if_absent(D::COLLECTION, &key, serde_json::to_value(doc)?)
            .await?;

        if created {
            if let WriteScope::Block(block) = scope {
                self.store
                    .append_journal(domain, block, D::COLLECTION, &key, None)
                    .await?;
            }
        }
        Ok(created)
    }

    /// Claim the right to apply one event
    ///
    /// Returns `false` when an earlier delivery already applied it. The receipt
    /// is journaled, so rolling the block back releases the claim.
    pub async fn claim(&self, domain: Domain, context: &ProcessingContext) -> IndexerResult<bool> {
        let key = receipt_key(domain, context);
        let receipt = json!({
            "domain": domain,
            "tx_hash": context.tx_hash,
            "event_index": context.event_index,
            "block_height": context.block.index,
            "block_hash": context.block.hash,
            "contract_identifier": context.contract_identifier,
        });

        let claimed = self
            .store
            .insert_if_absent(Collection::EventReceipts, &key, receipt)
            .await?;

        if !claimed {
            debug!(%domain, receipt = %key, "event already applied");
            return Ok(false);
        }

        if let Err(e) = self
            .store
            .append_journal(domain, &context.block, Collection::EventReceipts, &key, None)
            .await
        {
            // An unjournaled receipt could never be released
            self.store.delete(Collection::EventReceipts, &key).await?;
            return Err(e);
        }
        Ok(true)
    }

    /// Undo everything one event wrote, releasing its claim
    ///
    /// Journal entries from the event's receipt on are restored newest first,
    /// then dropped from the block journal. Returns how many writes were undone.
    pub async fn abandon(&self, domain: Domain, context: &ProcessingContext) -> IndexerResult<usize> {
        let receipt = receipt_key(domain, context);
        let journal = self.store.load_journal(domain, &context.block.hash).await?;
        let Some(start) = journal
            .iter()
            .position(|entry| entry.collection == Collection::EventReceipts && entry.key == receipt)
        else {
            return Ok(0);
        };

        let written = &journal[start..];
        for entry in written.iter().rev() {
            match &entry.previous {
                Some(previous) => {
                    self.store.put(entry.collection, &entry.key, previous.clone()).await?;
                }
                None => {
                    self.store.delete(entry.collection, &entry.key).await?;
                }
            }
        }
        self.store
            .discard_journal_from(domain, &context.block.hash, journal[start].seq)
            .await?;

        debug!(%domain, receipt = %receipt, undone = written.len(), "event abandoned");
        Ok(written.len())
    }

    /// Atomically rewrite a document from its current value
    ///
    /// `apply` starts from the stored document, or the default when there is
    /// none. Block-scoped writes are journaled like `upsert`.
    pub async fn update<D, F>(&self, domain: Domain, scope: &WriteScope, key: &str, apply: F) -> IndexerResult<()>
    where
        D: Document + Default + 'static,
        F: FnOnce(&mut D) + Send + 'static,
    {
        let owned_key = key.to_string();
        let previous = self
            .store
            .update(
                D::COLLECTION,
                key,
                Box::new(move |current| {
                    let mut doc = match current {
                        Some(value) => decode::<D>(&owned_key, value)?,
                        None => D::default(),
                    };
                    apply(&mut doc);
                    Ok(serde_json::to_value(&doc)?)
                }),
            )
            .await?;

        if let WriteScope::Block(block) = scope {
            self.store
                .append_journal(domain, block, D::COLLECTION, key, previous)
                .await?;
        }

        debug!(%domain, collection = %D::COLLECTION, key = %key, "projection update");
        Ok(())
    }

    /// Remove a document written outside any block
    pub async fn remove<D: Document>(&self, key: &str) -> IndexerResult<()> {
        self.store.delete(D::COLLECTION, key).await?;
        Ok(())
    }

    /// Drop journals older than `below_index` for one domain
    pub async fn prune_journal(&self, domain: Domain, below_index: u64) -> IndexerResult<u64> {
        self.store.prune_journal(domain, below_index).await
    }

    /// Journal of one block, for inspection
    pub async fn journal(&self, domain: Domain, block: &BlockRef) -> IndexerResult<Vec<crate::core::JournalEntry>> {
        self.store.load_journal(domain, &block.hash).await
    }
}

pub fn receipt_key(domain: Domain, context: &ProcessingContext) -> String {
    format!("{}:{}", domain, context.event_key())
}

fn decode<D: Document>(key: &str, value: Value) -> IndexerResult<D> {
    serde_json::from_value(value).map_err(|e| {
        StorageError::CorruptDocument {
            collection: D::COLLECTION.to_string(),
            key: key.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[async_trait]
impl OwnershipView for Projection {
    async fn listing_by_token_id(&self, token_id: u128) -> IndexerResult<Option<Listing>> {
        self.get::<Listing>(&Listing::key_for(token_id)).await
    }

    async fn owner_by_token_id(&self, token_id: u128) -> IndexerResult<Option<String>> {
        let record = self
            .get::<NftRecord>(&NftRecord::key_for(NftKind::Obligation, token_id))
            .await?;
        Ok(record.filter(|nft| !nft.burned).map(|nft| nft.owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ListingStatus, SystemStatus, TreasuryStats};

    fn listing(seller: &str, height: u64) -> Listing {
        Listing {
            stream_id: 7,
            seller: seller.to_string(),
            price: 950_000,
            status: ListingStatus::Active,
            expiry_block: None,
            buyer: None,
            marketplace_fee: None,
            listed_at_block: height,
            updated_at_block: height,
        }
    }

    #[tokio::test]
    async fn test_block_writes_are_journaled() {
        let store = Arc::new(MemoryStore::new());
        let projection = Projection::new(store.clone());
        let context = ProcessingContext::test(10);

        projection
            .upsert(Domain::Marketplace, &context.scope(), &listing("SP_A", 10))
            .await
            .unwrap();
        projection
            .upsert(Domain::Marketplace, &context.scope(), &listing("SP_B", 10))
            .await
            .unwrap();

        let journal = projection.journal(Domain::Marketplace, &context.block).await.unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[0].previous, None);
        assert_eq!(journal[1].previous.as_ref().unwrap()["seller"], "SP_A");

        let stored: Listing = projection.get("7").await.unwrap().unwrap();
        assert_eq!(stored.seller, "SP_B");
    }

    #[tokio::test]
    async fn test_off_chain_writes_are_not_journaled() {
        let store = Arc::new(MemoryStore::new());
        let projection = Projection::new(store.clone());
        let status = SystemStatus {
            paused: true,
            updated_by: "SP_ADMIN".to_string(),
            updated_at_block: 0,
        };

        projection
            .upsert(Domain::AccessControl, &WriteScope::OffChain, &status)
            .await
            .unwrap();
        assert_eq!(store.journal_len(Domain::AccessControl).await, 0);
    }

    #[tokio::test]
    async fn test_claim_is_granted_once() {
        let projection = Projection::new(Arc::new(MemoryStore::new()));
        let context = ProcessingContext::test(3);

        assert!(projection.claim(Domain::Streams, &context).await.unwrap());
        assert!(!projection.claim(Domain::Streams, &context).await.unwrap());
        assert!(projection.claim(Domain::Treasury, &context).await.unwrap());
    }

    #[tokio::test]
    async fn test_abandon_restores_event_writes() {
        let store = Arc::new(MemoryStore::new());
        let projection = Projection::new(store.clone());
        let first = ProcessingContext::test(10);
        let mut second = ProcessingContext::test(10);
        second.event_index = 1;

        assert!(projection.claim(Domain::Marketplace, &first).await.unwrap());
        projection
            .upsert(Domain::Marketplace, &first.scope(), &listing("SP_A", 10))
            .await
            .unwrap();

        assert!(projection.claim(Domain::Marketplace, &second).await.unwrap());
        projection
            .upsert(Domain::Marketplace, &second.scope(), &listing("SP_B", 10))
            .await
            .unwrap();
        projection
            .upsert(Domain::Marketplace, &second.scope(), &listing("SP_C", 10))
            .await
            .unwrap();

        assert_eq!(projection.abandon(Domain::Marketplace, &second).await.unwrap(), 3);

        // The first event's write survives and only its journal remains
        let stored: Listing = projection.get("7").await.unwrap().unwrap();
        assert_eq!(stored.seller, "SP_A");
        assert_eq!(projection.journal(Domain::Marketplace, &first.block).await.unwrap().len(), 2);

        // The claim is released
        assert!(projection.claim(Domain::Marketplace, &second).await.unwrap());
        assert!(!projection.claim(Domain::Marketplace, &first).await.unwrap());
    }

    #[tokio::test]
    async fn test_abandon_without_claim_is_a_no_op() {
        let projection = Projection::new(Arc::new(MemoryStore::new()));
        let context = ProcessingContext::test(4);
        assert_eq!(projection.abandon(Domain::Streams, &context).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_journals_previous_document() {
        let store = Arc::new(MemoryStore::new());
        let projection = Projection::new(store.clone());
        let context = ProcessingContext::test(8);

        for _ in 0..2 {
            projection
                .update::<TreasuryStats, _>(Domain::Treasury, &context.scope(), TreasuryStats::KEY, |stats| {
                    stats.fee_count += 1;
                })
                .await
                .unwrap();
        }

        let stats: TreasuryStats = projection.get(TreasuryStats::KEY).await.unwrap().unwrap();
        assert_eq!(stats.fee_count, 2);
        let journal = projection.journal(Domain::Treasury, &context.block).await.unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[0].previous, None);
        assert_eq!(journal[1].previous.as_ref().unwrap()["fee_count"], 1);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(Collection::Listings, "7", json!({ "stream_id": "not a number" }))
            .await
            .unwrap();
        let projection = Projection::new(store);

        let err = projection.get::<Listing>("7").await.unwrap_err();
        assert!(err.to_string().contains("listings/7"));
    }

    #[tokio::test]
    async fn test_ownership_view_ignores_burned_tokens() {
        let projection = Projection::new(Arc::new(MemoryStore::new()));
        let context = ProcessingContext::test(1);
        let mut nft = NftRecord {
            kind: NftKind::Obligation,
            token_id: 7,
            owner: "SP_A".to_string(),
            stream_id: Some(7),
            burned: false,
            minted_at_block: 1,
            updated_at_block: 1,
        };

        projection.upsert(Domain::Nft, &context.scope(), &nft).await.unwrap();
        assert_eq!(projection.owner_by_token_id(7).await.unwrap().as_deref(), Some("SP_A"));

        nft.burned = true;
        projection.upsert(Domain::Nft, &context.scope(), &nft).await.unwrap();
        assert_eq!(projection.owner_by_token_id(7).await.unwrap(), None);
        assert_eq!(projection.listing_by_token_id(7).await.unwrap(), None);
    }
}
