//! Webhook batch pipeline: reconcile retracted blocks, then apply new ones

pub mod aggregator;
pub mod ingest;
pub mod reconciler;

pub use aggregator::{BatchResult, WebhookResponse};
pub use ingest::{BatchIngest, IngestPipeline};
pub use reconciler::Reconciler;
