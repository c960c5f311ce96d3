//! In-process projection store
//!
//! Backs tests and `storage.backend = "memory"` deployments. Every operation
//! takes the lock once, which gives the same per-key atomicity the Postgres
//! store provides.

use crate::core::{
    BlockRef, Collection, Domain, DocumentUpdate, IndexerResult, JournalEntry, ProjectionStore,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct BlockJournal {
    index: u64,
    entries: Vec<JournalEntry>,
}

#[derive(Debug, Default)]
struct Journal {
    next_seq: u64,
    blocks: HashMap<(Domain, String), BlockJournal>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<Collection, BTreeMap<String, Value>>>,
    journal: RwLock<Journal>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every document of a collection, ordered by key
    pub async fn documents(&self, collection: Collection) -> Vec<(String, Value)> {
        self.documents
            .read()
            .await
            .get(&collection)
            .map(|docs| docs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    pub async fn count(&self, collection: Collection) -> usize {
        self.documents
            .read()
            .await
            .get(&collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Journal entries held for a domain across all blocks
    pub async fn journal_len(&self, domain: Domain) -> usize {
        self.journal
            .read()
            .await
            .blocks
            .iter()
            .filter(|((d, _), _)| *d == domain)
            .map(|(_, block)| block.entries.len())
            .sum()
    }
}

#[async_trait]
impl ProjectionStore for MemoryStore {
    async fn get(&self, collection: Collection, key: &str) -> IndexerResult<Option<Value>> {
        Ok(self
            .documents
            .read()
            .await
            .get(&collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn put(&self, collection: Collection, key: &str, doc: Value) -> IndexerResult<Option<Value>> {
        Ok(self
            .documents
            .write()
            .await
            .entry(collection)
            .or_default()
            .insert(key.to_string(), doc))
    }

    async fn delete(&self, collection: Collection, key: &str) -> IndexerResult<Option<Value>> {
        Ok(self
            .documents
            .write()
            .await
            .get_mut(&collection)
            .and_then(|docs| docs.remove(key)))
    }

    async fn insert_if_absent(&self, collection: Collection, key: &str, doc: Value) -> IndexerResult<bool> {
        let mut documents = self.documents.write().await;
        let docs = documents.entry(collection).or_default();
        if docs.contains_key(key) {
            return Ok(false);
        }
        docs.insert(key.to_string(), doc);
        Ok(true)
    }

    async fn update(&self, collection: Collection, key: &str, apply: DocumentUpdate) -> IndexerResult<Option<Value>> {
        let mut documents = self.documents.write().await;
        let docs = documents.entry(collection).or_default();
        let next = apply(docs.get(key).cloned())?;
        Ok(docs.insert(key.to_string(), next))
    }

    async fn find_by(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> IndexerResult<Vec<(String, Value)>> {
        Ok(self
            .documents
            .read()
            .await
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, doc)| doc.get(field) == Some(value))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append_journal(
        &self,
        domain: Domain,
        block: &BlockRef,
        collection: Collection,
        key: &str,
        previous: Option<Value>,
    ) -> IndexerResult<()> {
        let mut journal = self.journal.write().await;
        let seq = journal.next_seq;
        journal.next_seq += 1;

        let entry = journal
            .blocks
            .entry((domain, block.hash.clone()))
            .or_insert_with(|| BlockJournal {
                index: block.index,
                entries: Vec::new(),
            });
        entry.entries.push(JournalEntry {
            seq,
            collection,
            key: key.to_string(),
            previous,
        });
        Ok(())
    }

    async fn load_journal(&self, domain: Domain, block_hash: &str) -> IndexerResult<Vec<JournalEntry>> {
        Ok(self
            .journal
            .read()
            .await
            .blocks
            .get(&(domain, block_hash.to_string()))
            .map(|block| block.entries.clone())
            .unwrap_or_default())
    }

    async fn clear_journal(&self, domain: Domain, block_hash: &str) -> IndexerResult<()> {
        self.journal
            .write()
            .await
            .blocks
            .remove(&(domain, block_hash.to_string()));
        Ok(())
    }

    async fn discard_journal_from(&self, domain: Domain, block_hash: &str, from_seq: u64) -> IndexerResult<()> {
        let mut journal = self.journal.write().await;
        let key = (domain, block_hash.to_string());
        if let Some(block) = journal.blocks.get_mut(&key) {
            block.entries.retain(|entry| entry.seq < from_seq);
            if block.entries.is_empty() {
                journal.blocks.remove(&key);
            }
        }
        Ok(())
    }

    async fn prune_journal(&self, domain: Domain, below_index: u64) -> IndexerResult<u64> {
        let mut journal = self.journal.write().await;
        let before = journal.blocks.len();
        journal
            .blocks
            .retain(|(d, _), block| *d != domain || block.index >= below_index);
        Ok((before - journal.blocks.len()) as u64)
    }

    async fn health_check(&self) -> IndexerResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_returns_replaced_document() {
        let store = MemoryStore::new();
        assert_eq!(store.put(Collection::Streams, "1", json!({ "v": 1 })).await.unwrap(), None);
        assert_eq!(
            store.put(Collection::Streams, "1", json!({ "v": 2 })).await.unwrap(),
            Some(json!({ "v": 1 }))
        );
        assert_eq!(store.delete(Collection::Streams, "1").await.unwrap(), Some(json!({ "v": 2 })));
        assert_eq!(store.get(Collection::Streams, "1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_by_field() {
        let store = MemoryStore::new();
        store.put(Collection::Proposals, "1", json!({ "status": "approving" })).await.unwrap();
        store.put(Collection::Proposals, "2", json!({ "status": "executed" })).await.unwrap();
        store.put(Collection::Proposals, "3", json!({ "status": "approving" })).await.unwrap();

        let found = store
            .find_by(Collection::Proposals, "status", &json!("approving"))
            .await
            .unwrap();
        let keys: Vec<_> = found.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_journal_is_scoped_and_pruned() {
        let store = MemoryStore::new();
        let old = BlockRef::new(5, "0x05");
        let new = BlockRef::new(9, "0x09");

        store.append_journal(Domain::Streams, &old, Collection::Streams, "1", None).await.unwrap();
        store.append_journal(Domain::Streams, &new, Collection::Streams, "1", Some(json!({}))).await.unwrap();
        store.append_journal(Domain::Treasury, &old, Collection::Proposals, "1", None).await.unwrap();

        assert_eq!(store.load_journal(Domain::Streams, "0x05").await.unwrap().len(), 1);
        assert_eq!(store.prune_journal(Domain::Streams, 9).await.unwrap(), 1);
        assert!(store.load_journal(Domain::Streams, "0x05").await.unwrap().is_empty());
        assert_eq!(store.journal_len(Domain::Treasury).await, 1);
    }

    #[tokio::test]
    async fn test_journal_tail_is_discarded() {
        let store = MemoryStore::new();
        let block = BlockRef::new(5, "0x05");
        for key in ["1", "2", "3"] {
            store.append_journal(Domain::Streams, &block, Collection::Streams, key, None).await.unwrap();
        }

        let entries = store.load_journal(Domain::Streams, "0x05").await.unwrap();
        store
            .discard_journal_from(Domain::Streams, "0x05", entries[1].seq)
            .await
            .unwrap();
        let kept = store.load_journal(Domain::Streams, "0x05").await.unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].key, "1");

        store.discard_journal_from(Domain::Streams, "0x05", 0).await.unwrap();
        assert_eq!(store.journal_len(Domain::Streams).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let bump = |store: std::sync::Arc<MemoryStore>| async move {
            store
                .update(
                    Collection::TreasuryStats,
                    "totals",
                    Box::new(|current| {
                        let count = current.and_then(|doc| doc["count"].as_u64()).unwrap_or(0);
                        Ok(json!({ "count": count + 1 }))
                    }),
                )
                .await
                .unwrap()
        };

        let tasks: Vec<_> = (0..32).map(|_| tokio::spawn(bump(store.clone()))).collect();
        for task in tasks {
            task.await.unwrap();
        }
        let doc = store.get(Collection::TreasuryStats, "totals").await.unwrap().unwrap();
        assert_eq!(doc["count"], 32);
    }
}
