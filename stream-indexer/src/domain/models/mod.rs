//! Projection documents
//!
//! Each model is one document of a named collection, addressed by its natural
//! key. Handlers never delete documents; lifecycle changes are status fields.

pub mod access;
pub mod amount;
pub mod marketplace;
pub mod nft;
pub mod notification;
pub mod payment;
pub mod stream;
pub mod treasury;

pub use access::*;
pub use marketplace::*;
pub use nft::*;
pub use notification::*;
pub use payment::*;
pub use stream::*;
pub use treasury::*;

use crate::core::Collection;
use serde::{de::DeserializeOwned, Serialize};

/// A document stored under a natural key in one collection
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn key(&self) -> String;
}
