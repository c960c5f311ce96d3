//! Per-domain ingestion of one webhook batch

use super::{BatchResult, Reconciler};
use crate::adapters::storage::Projection;
use crate::chainhook::{Batch, Block, BlockWalker};
use crate::core::{Domain, HandleOutcome, IndexerResult, ProcessingContext};
use crate::domain::events::DomainEvent;
use crate::domain::processors::DomainProcessor;
use crate::metrics::Metrics;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Object-safe entry point the HTTP layer dispatches batches to
#[async_trait]
pub trait BatchIngest: Send + Sync {
    fn domain(&self) -> Domain;

    /// Event tags the domain decodes
    fn supported_events(&self) -> &'static [&'static str];

    async fn ingest(&self, batch: Batch) -> BatchResult;
}

/// Rollback, then apply, for one domain
///
/// Blocks, transactions and events are handled strictly in order. A failing
/// event stops the rest of its block; its own writes are undone so a
/// redelivery applies it again, while events handled before it stay applied.
pub struct IngestPipeline<P: DomainProcessor> {
    processor: Arc<P>,
    projection: Projection,
    reconciler: Reconciler,
    journal_depth: u64,
    metrics: Option<Metrics>,
}

impl<P: DomainProcessor> IngestPipeline<P> {
    pub fn new(processor: Arc<P>, projection: Projection, journal_depth: u64) -> Self {
        let reconciler = Reconciler::new(projection.store().clone());
        Self {
            processor,
            projection,
            reconciler,
            journal_depth,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.reconciler = self.reconciler.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    fn domain_of() -> Domain {
        <P::Event as DomainEvent>::DOMAIN
    }

    pub async fn process(&self, batch: &Batch) -> BatchResult {
        let domain = Self::domain_of();
        let mut result = BatchResult::default();
        info!(
            %domain,
            delivery = %batch.delivery_id(),
            apply = batch.apply.len(),
            rollback = batch.rollback.len(),
            "processing batch"
        );

        if !batch.rollback.is_empty() {
            self.reconciler.rollback(domain, &batch.rollback, &mut result).await;
        }

        let mut blocks: Vec<&Block> = batch.apply.iter().collect();
        blocks.sort_by_key(|b| b.block_identifier.index);

        for block in &blocks {
            let index = block.block_identifier.index;
            if let Err(e) = self.apply_block(block, &mut result).await {
                warn!(%domain, block = index, error = %e, "block processing stopped");
                if let Some(metrics) = &self.metrics {
                    metrics.block_errors.with_label_values(&[domain.as_str()]).inc();
                }
                result.block_failed(index, e);
            }
        }

        if let Some(newest) = blocks.last().map(|b| b.block_identifier.index) {
            self.prune(domain, newest).await;
        }

        if let Some(metrics) = &self.metrics {
            let outcome = if result.success() { "success" } else { "partial" };
            metrics.batches.with_label_values(&[domain.as_str(), outcome]).inc();
            metrics
                .events_processed
                .with_label_values(&[domain.as_str()])
                .inc_by(result.processed as u64);
        }
        info!(%domain, processed = result.processed, errors = result.errors.len(), "batch done");
        result
    }

    async fn apply_block(&self, block: &Block, result: &mut BatchResult) -> IndexerResult<()> {
        let walker = BlockWalker::new(block);

        for (context, event) in walker.print_events::<P::Event>() {
            let outcome = self.handle_event(event, &context).await?;
            result.record(outcome);
        }
        for (context, event) in walker.native_events::<P::Event>() {
            let outcome = self.handle_event(event, &context).await?;
            result.record(outcome);
        }

        self.processor.after_block(walker.block_ref()).await
    }

    async fn handle_event(&self, event: P::Event, context: &ProcessingContext) -> IndexerResult<HandleOutcome> {
        let error = match self.processor.handle(event, context).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) => e,
        };

        let domain = Self::domain_of();
        match self.projection.abandon(domain, context).await {
            Ok(undone) => debug!(%domain, event = %context.event_key(), undone, "failed event undone"),
            Err(e) => warn!(%domain, event = %context.event_key(), error = %e, "failed event could not be undone"),
        }
        Err(error)
    }

    async fn prune(&self, domain: Domain, newest: u64) {
        let Some(below) = newest.checked_sub(self.journal_depth) else {
            return;
        };
        match self.projection.prune_journal(domain, below).await {
            Ok(0) => {}
            Ok(pruned) => debug!(%domain, below, pruned, "pruned journal"),
            Err(e) => warn!(%domain, below, error = %e, "journal prune failed"),
        }
    }
}

#[async_trait]
impl<P: DomainProcessor> BatchIngest for IngestPipeline<P> {
    fn domain(&self) -> Domain {
        Self::domain_of()
    }

    fn supported_events(&self) -> &'static [&'static str] {
        <P::Event as DomainEvent>::TAGS
    }

    async fn ingest(&self, batch: Batch) -> BatchResult {
        self.process(&batch).await
    }
}
