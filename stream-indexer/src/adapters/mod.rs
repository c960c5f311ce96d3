//! Adapters layer
//!
//! Implementations of the core ports against external systems: the
//! projection store, real-time and notification fan-out, and chain reads.

pub mod chain;
pub mod fanout;
pub mod storage;
