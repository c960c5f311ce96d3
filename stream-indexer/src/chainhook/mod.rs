//! Chainhook delivery format and block traversal

pub mod payload;
pub mod walker;

pub use payload::*;
pub use walker::BlockWalker;
