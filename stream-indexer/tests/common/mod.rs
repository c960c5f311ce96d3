//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use stream_indexer::adapters::storage::MemoryStore;
use stream_indexer::chainhook::Batch;
use stream_indexer::config::{IndexerConfig, StorageBackend};
use stream_indexer::core::{
    BlockRef, ChainError, ChainReader, Collection, DocumentUpdate, Domain, IndexerResult, JournalEntry,
    ProjectionStore, RealtimePublisher, StorageError,
};
use stream_indexer::domain::models::{Notification, RealtimeEvent};
use stream_indexer::infrastructure::{Backends, ServiceContainer};
use stream_indexer::pipeline::{BatchIngest, BatchResult};

pub const TOKEN: &str = "test-token";
pub const PAYMENT_SECRET: &str = "payment-secret";
pub const CONTRACT: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7.stream-protocol";

/// Chain reader with settable answers
pub struct FakeChain {
    pub admins: Mutex<Vec<String>>,
    pub threshold: Mutex<Option<u64>>,
}

impl FakeChain {
    pub fn new(admins: &[&str], threshold: Option<u64>) -> Self {
        Self {
            admins: Mutex::new(admins.iter().map(|a| a.to_string()).collect()),
            threshold: Mutex::new(threshold),
        }
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn admins(&self) -> IndexerResult<Vec<String>> {
        Ok(self.admins.lock().unwrap().clone())
    }

    async fn approval_threshold(&self) -> IndexerResult<u64> {
        self.threshold
            .lock()
            .unwrap()
            .ok_or_else(|| ChainError::Request("node unreachable".to_string()).into())
    }
}

/// Publisher remembering every event it was asked to push
#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<RealtimeEvent>>,
}

impl Recorder {
    pub fn on_channel(&self, channel: &str) -> Vec<RealtimeEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.channel == channel)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl RealtimePublisher for Recorder {
    async fn publish(&self, event: &RealtimeEvent) -> IndexerResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Memory store that fails writes to one collection while `failing` is set
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub collection: Collection,
    pub failing: AtomicBool,
}

impl FlakyStore {
    pub fn new(collection: Collection) -> Self {
        Self {
            inner: MemoryStore::new(),
            collection,
            failing: AtomicBool::new(false),
        }
    }

    pub fn fail(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }

    fn check(&self, collection: Collection) -> IndexerResult<()> {
        if collection == self.collection && self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Database("connection reset".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectionStore for FlakyStore {
    async fn get(&self, collection: Collection, key: &str) -> IndexerResult<Option<Value>> {
        self.inner.get(collection, key).await
    }

    async fn put(&self, collection: Collection, key: &str, doc: Value) -> IndexerResult<Option<Value>> {
        self.check(collection)?;
        self.inner.put(collection, key, doc).await
    }

    async fn delete(&self, collection: Collection, key: &str) -> IndexerResult<Option<Value>> {
        self.inner.delete(collection, key).await
    }

    async fn insert_if_absent(&self, collection: Collection, key: &str, doc: Value) -> IndexerResult<bool> {
        self.check(collection)?;
        self.inner.insert_if_absent(collection, key, doc).await
    }

    async fn update(&self, collection: Collection, key: &str, apply: DocumentUpdate) -> IndexerResult<Option<Value>> {
        self.check(collection)?;
        self.inner.update(collection, key, apply).await
    }

    async fn find_by(&self, collection: Collection, field: &str, value: &Value) -> IndexerResult<Vec<(String, Value)>> {
        self.inner.find_by(collection, field, value).await
    }

    async fn append_journal(
        &self,
        domain: Domain,
        block: &BlockRef,
        collection: Collection,
        key: &str,
        previous: Option<Value>,
    ) -> IndexerResult<()> {
        self.inner.append_journal(domain, block, collection, key, previous).await
    }

    async fn load_journal(&self, domain: Domain, block_hash: &str) -> IndexerResult<Vec<JournalEntry>> {
        self.inner.load_journal(domain, block_hash).await
    }

    async fn clear_journal(&self, domain: Domain, block_hash: &str) -> IndexerResult<()> {
        self.inner.clear_journal(domain, block_hash).await
    }

    async fn discard_journal_from(&self, domain: Domain, block_hash: &str, from_seq: u64) -> IndexerResult<()> {
        self.inner.discard_journal_from(domain, block_hash, from_seq).await
    }

    async fn prune_journal(&self, domain: Domain, below_index: u64) -> IndexerResult<u64> {
        self.inner.prune_journal(domain, below_index).await
    }

    async fn health_check(&self) -> IndexerResult<()> {
        Ok(())
    }
}

pub struct Harness {
    pub container: ServiceContainer,
    pub store: Arc<dyn ProjectionStore>,
    pub chain: Arc<FakeChain>,
    pub recorder: Arc<Recorder>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), FakeChain::new(&[], Some(2)))
    }

    pub fn with_chain(chain: FakeChain) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), chain)
    }

    pub fn with_store(store: Arc<dyn ProjectionStore>, chain: FakeChain) -> Self {
        Self::build(store, chain, |_| {})
    }

    /// Default harness with test config adjusted before assembly
    pub fn configured(adjust: impl FnOnce(&mut IndexerConfig)) -> Self {
        Self::build(Arc::new(MemoryStore::new()), FakeChain::new(&[], Some(2)), adjust)
    }

    fn build(store: Arc<dyn ProjectionStore>, chain: FakeChain, adjust: impl FnOnce(&mut IndexerConfig)) -> Self {
        let mut config = IndexerConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.auth.chainhook_token = Some(TOKEN.to_string());
        config.auth.payment_secret = Some(PAYMENT_SECRET.to_string());
        config.rate_limit.requests_per_minute = 1000;
        config.rate_limit.burst = 1000;
        config.chain.admin_cache_ttl_secs = 1;
        adjust(&mut config);

        let chain = Arc::new(chain);
        let recorder = Arc::new(Recorder::default());
        let container = ServiceContainer::assemble(
            config,
            Backends {
                store: store.clone(),
                chain: chain.clone(),
                publishers: vec![recorder.clone()],
            },
        )
        .expect("container assembles");

        Self {
            container,
            store,
            chain,
            recorder,
        }
    }

    pub async fn ingest(&self, domain: Domain, batch: Value) -> BatchResult {
        let batch: Batch = serde_json::from_value(batch).expect("well-formed batch");
        self.container.pipelines[&domain].ingest(batch).await
    }

    pub async fn notifications_for(&self, user: &str) -> Vec<Notification> {
        self.store
            .find_by(Collection::Notifications, "user", &json!(user))
            .await
            .unwrap()
            .into_iter()
            .map(|(_, doc)| serde_json::from_value(doc).unwrap())
            .collect()
    }
}

/// A print event record emitted by the test contract
pub fn print(value: Value) -> Value {
    json!({
        "type": "SmartContractEvent",
        "data": {
            "contract_identifier": CONTRACT,
            "topic": "print",
            "value": value,
        }
    })
}

pub fn tx(hash: &str, success: bool, events: Vec<Value>) -> Value {
    json!({
        "transaction_identifier": { "hash": hash },
        "metadata": {
            "success": success,
            "receipt": { "events": events },
        }
    })
}

pub fn block(index: u64, hash: &str, transactions: Vec<Value>) -> Value {
    json!({
        "block_identifier": { "index": index, "hash": hash },
        "timestamp": 1_700_000_000 + index as i64,
        "transactions": transactions,
    })
}

pub fn apply(blocks: Vec<Value>) -> Value {
    json!({ "apply": blocks, "rollback": [] })
}

pub fn stream_created(stream_id: u64, amount: u64) -> Value {
    print(json!({
        "event": "stream-created",
        "stream-id": stream_id,
        "sender": "SP_SENDER",
        "recipient": "SP_RECIPIENT",
        "amount": amount,
        "rate-per-block": 10,
        "start-block": 100,
        "end-block": 200,
    }))
}

pub fn stream_withdrawal(stream_id: u64, amount: u64) -> Value {
    print(json!({
        "event": "stream-withdrawal",
        "stream-id": stream_id,
        "recipient": "SP_RECIPIENT",
        "amount": amount,
    }))
}
