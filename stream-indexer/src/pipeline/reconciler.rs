//! Reorg reconciliation
//!
//! Every write made while applying a block is journaled with the document it
//! replaced. Rolling back walks the retracted blocks oldest first and restores
//! the first previous value seen for each key, which is the value from before
//! the earliest retracted block touched it.

use super::BatchResult;
use crate::chainhook::Block;
use crate::core::{BlockRef, Collection, Domain, IndexerResult, ProjectionStore};
use crate::metrics::Metrics;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Reconciler {
    store: Arc<dyn ProjectionStore>,
    metrics: Option<Metrics>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ProjectionStore>) -> Self {
        Self { store, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Revert the writes `domain` made for each retracted block
    ///
    /// A block that fails to revert keeps its journal and is reported in
    /// `result`; later blocks are still attempted.
    pub async fn rollback(&self, domain: Domain, blocks: &[Block], result: &mut BatchResult) {
        let mut ordered: Vec<BlockRef> = blocks.iter().map(Block::block_ref).collect();
        ordered.sort_by_key(|b| b.index);

        let mut restored: HashSet<(Collection, String)> = HashSet::new();
        for block in &ordered {
            match self.revert_block(domain, block, &mut restored).await {
                Ok(0) => {
                    debug!(%domain, block = block.index, hash = %block.hash, "nothing journaled for block");
                    self.count(domain, "empty");
                }
                Ok(reverted) => {
                    info!(%domain, block = block.index, hash = %block.hash, reverted, "rolled back block");
                    self.count(domain, "reverted");
                }
                Err(e) => {
                    warn!(%domain, block = block.index, hash = %block.hash, error = %e, "rollback failed");
                    self.count(domain, "failed");
                    result.rollback_failed(block.index, e);
                }
            }
        }
    }

    async fn revert_block(
        &self,
        domain: Domain,
        block: &BlockRef,
        restored: &mut HashSet<(Collection, String)>,
    ) -> IndexerResult<usize> {
        let entries = self.store.load_journal(domain, &block.hash).await?;
        let mut reverted = 0;

        for entry in entries {
            if !restored.insert((entry.collection, entry.key.clone())) {
                continue;
            }
            match entry.previous {
                Some(previous) => {
                    self.store.put(entry.collection, &entry.key, previous).await?;
                }
                None => {
                    self.store.delete(entry.collection, &entry.key).await?;
                }
            }
            reverted += 1;
        }

        self.store.clear_journal(domain, &block.hash).await?;
        Ok(reverted)
    }

    fn count(&self, domain: Domain, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics
                .rollback_blocks
                .with_label_values(&[domain.as_str(), outcome])
                .inc();
        }
    }
}
