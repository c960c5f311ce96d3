//! Domain processors
//!
//! One processor per business domain. Each turns decoded events into
//! projection writes and fan-out, selecting the handler by an exhaustive
//! `match` on the domain's event enum.

mod access;
mod marketplace;
mod nft;
mod payments;
mod streams;
mod treasury;

pub use access::AccessControlProcessor;
pub use marketplace::MarketplaceProcessor;
pub use nft::NftProcessor;
pub use payments::PaymentProcessor;
pub use streams::StreamProcessor;
pub use treasury::TreasuryProcessor;

use crate::core::{BlockRef, HandleOutcome, IndexerResult, ProcessingContext};
use crate::domain::events::DomainEvent;
use async_trait::async_trait;

/// Applies the events of one domain to the projection
#[async_trait]
pub trait DomainProcessor: Send + Sync + 'static {
    type Event: DomainEvent;

    /// Apply one event
    ///
    /// Implementations claim the event before any write, so a redelivered
    /// event reports `Duplicate` and has no side effects.
    async fn handle(&self, event: Self::Event, context: &ProcessingContext) -> IndexerResult<HandleOutcome>;

    /// Called once every event of an applied block has been handled
    async fn after_block(&self, _block: &BlockRef) -> IndexerResult<()> {
        Ok(())
    }
}
