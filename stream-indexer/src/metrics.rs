//! Prometheus metrics
//!
//! - `indexer_batches_total{domain, outcome}` - webhook batches by result
//! - `indexer_events_processed_total{domain}` - events applied or recognized as duplicates
//! - `indexer_block_errors_total{domain}` - blocks whose processing stopped on an error
//! - `indexer_rollback_blocks_total{domain, outcome}` - rolled back blocks
//! - `indexer_gate_rejections_total{reason}` - requests refused before processing
//! - `indexer_fanout_failures_total{sink}` - notification and push failures

use anyhow::Result;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub batches: IntCounterVec,
    pub events_processed: IntCounterVec,
    pub block_errors: IntCounterVec,
    pub rollback_blocks: IntCounterVec,
    pub gate_rejections: IntCounterVec,
    pub fanout_failures: IntCounterVec,
}

fn counter(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("indexer".to_string()), None)?;

        Ok(Self {
            batches: counter(&registry, "batches_total", "Webhook batches processed", &["domain", "outcome"])?,
            events_processed: counter(
                &registry,
                "events_processed_total",
                "Events applied or recognized as duplicates",
                &["domain"],
            )?,
            block_errors: counter(&registry, "block_errors_total", "Blocks that failed mid-way", &["domain"])?,
            rollback_blocks: counter(
                &registry,
                "rollback_blocks_total",
                "Blocks rolled back",
                &["domain", "outcome"],
            )?,
            gate_rejections: counter(
                &registry,
                "gate_rejections_total",
                "Requests rejected before processing",
                &["reason"],
            )?,
            fanout_failures: counter(
                &registry,
                "fanout_failures_total",
                "Notification and realtime delivery failures",
                &["sink"],
            )?,
            registry,
        })
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
