//! Core trait abstractions (Ports in Hexagonal Architecture)

use async_trait::async_trait;
use serde_json::Value;

use super::error::IndexerResult;
use super::types::*;
use crate::domain::models::{Listing, Notification, RealtimeEvent};

/// Read-modify-write step applied by `ProjectionStore::update`
pub type DocumentUpdate = Box<dyn FnOnce(Option<Value>) -> IndexerResult<Value> + Send>;

/// Storage port - key-scoped document operations against named collections
///
/// Every single-document operation must be atomic per key. Nothing here
/// assumes transactions spanning several keys or collections.
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    /// Fetch a document by key
    async fn get(&self, collection: Collection, key: &str) -> IndexerResult<Option<Value>>;

    /// Insert or replace a document, returning the document it replaced
    async fn put(&self, collection: Collection, key: &str, doc: Value) -> IndexerResult<Option<Value>>;

    /// Remove a document, returning it if it existed
    async fn delete(&self, collection: Collection, key: &str) -> IndexerResult<Option<Value>>;

    /// Insert only when the key is absent; `true` when this call created it
    async fn insert_if_absent(&self, collection: Collection, key: &str, doc: Value) -> IndexerResult<bool>;

    /// Replace a document with `apply(current)` as one atomic step per key,
    /// returning the document it replaced
    ///
    /// Concurrent updates of the same key are serialized, so none is lost.
    async fn update(&self, collection: Collection, key: &str, apply: DocumentUpdate) -> IndexerResult<Option<Value>>;

    /// Documents whose top-level `field` equals `value`
    async fn find_by(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> IndexerResult<Vec<(String, Value)>>;

    /// Record the document replaced by a write made while applying `block`
    async fn append_journal(
        &self,
        domain: Domain,
        block: &BlockRef,
        collection: Collection,
        key: &str,
        previous: Option<Value>,
    ) -> IndexerResult<()>;

    /// Journal entries for one block, in write order
    async fn load_journal(&self, domain: Domain, block_hash: &str) -> IndexerResult<Vec<JournalEntry>>;

    /// Drop the journal of one block once it has been reverted
    async fn clear_journal(&self, domain: Domain, block_hash: &str) -> IndexerResult<()>;

    /// Drop the entries of one block's journal from `from_seq` on
    async fn discard_journal_from(&self, domain: Domain, block_hash: &str, from_seq: u64) -> IndexerResult<()>;

    /// Drop journal entries of blocks below `below_index`; returns how many were removed
    async fn prune_journal(&self, domain: Domain, below_index: u64) -> IndexerResult<u64>;

    /// Health check
    async fn health_check(&self) -> IndexerResult<()>;
}

/// Durable per-user notification records
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> IndexerResult<()>;
}

/// Ephemeral real-time push, keyed by user channel or shared topic
#[async_trait]
pub trait RealtimePublisher: Send + Sync {
    async fn publish(&self, event: &RealtimeEvent) -> IndexerResult<()>;
}

/// Read-only calls against the chain itself
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current treasury admin set
    async fn admins(&self) -> IndexerResult<Vec<String>>;

    /// Current number of approvals a withdrawal proposal needs
    async fn approval_threshold(&self) -> IndexerResult<u64>;
}

/// Narrow read-only view any domain may use to look across domains
#[async_trait]
pub trait OwnershipView: Send + Sync {
    /// Listing currently recorded for a token (stream) id
    async fn listing_by_token_id(&self, token_id: u128) -> IndexerResult<Option<Listing>>;

    /// Current owner of the obligation NFT for a token id
    async fn owner_by_token_id(&self, token_id: u128) -> IndexerResult<Option<String>>;
}
