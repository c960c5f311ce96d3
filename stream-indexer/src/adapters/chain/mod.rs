//! Authoritative reads against the chain

pub mod directory;
pub mod stacks;

pub use directory::AdminDirectory;
pub use stacks::StacksNodeClient;

use crate::core::{ChainError, ChainReader, IndexerResult};
use async_trait::async_trait;

/// Reader used when no treasury contract is configured
///
/// Every call fails, so callers fall back to their configured values.
pub struct UnconfiguredChain;

#[async_trait]
impl ChainReader for UnconfiguredChain {
    async fn admins(&self) -> IndexerResult<Vec<String>> {
        Err(ChainError::Request("no treasury contract configured".to_string()).into())
    }

    async fn approval_threshold(&self) -> IndexerResult<u64> {
        Err(ChainError::Request("no treasury contract configured".to_string()).into())
    }
}
