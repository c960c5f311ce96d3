//! Stream Indexer Library
//!
//! Ingests Chainhook webhook deliveries for the streams, marketplace, NFT,
//! treasury and access-control contracts and keeps an off-chain projection
//! of their state, with reorg rollback and per-user notification fan-out.

pub mod adapters;
pub mod api;
pub mod chainhook;
pub mod clarity;
pub mod config;
pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod metrics;
pub mod pipeline;

// Re-export commonly used types
pub use config::IndexerConfig;
pub use infrastructure::ServiceContainer;
pub use pipeline::{BatchResult, WebhookResponse};
