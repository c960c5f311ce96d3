//! Decoded domain events
//!
//! One closed enum per business domain, one variant per on-chain event tag.
//! Adding a tag means adding a variant, and the compiler then points at every
//! processor `match` that has to handle it.

pub mod access;
pub mod fields;
pub mod marketplace;
pub mod nft;
pub mod streams;
pub mod treasury;

pub use access::*;
pub use fields::Fields;
pub use marketplace::*;
pub use nft::*;
pub use streams::*;
pub use treasury::*;

use crate::chainhook::{NativeAssetEvent, PrintEvent};
use crate::core::{DecodeError, Domain};
use std::fmt::Debug;

/// A typed event of one business domain
pub trait DomainEvent: Sized + Debug + Send + Sync + 'static {
    /// Domain the event vocabulary belongs to
    const DOMAIN: Domain;

    /// Every tag this domain decodes
    const TAGS: &'static [&'static str];

    /// Decode the fields of a print tuple carrying `tag`
    fn decode(tag: &str, fields: &Fields<'_>) -> Result<Self, DecodeError>;

    /// Tag of this event
    fn tag(&self) -> &'static str;

    /// Map a native asset event into this domain, if the domain tracks it
    fn from_native(_event: &NativeAssetEvent) -> Option<Self> {
        None
    }
}

/// Decode a print record against the vocabulary of `E`
pub fn decode_print<E: DomainEvent>(print: &PrintEvent<'_>) -> Result<E, DecodeError> {
    let fields = Fields::from_value(&print.value)?;
    let tag = fields.tag()?;
    E::decode(tag, &fields)
}
