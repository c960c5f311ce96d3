//! Domain layer - business logic and domain models
//!
//! This layer contains the event vocabulary of every business domain, the
//! projection documents those events drive, and the processors that apply
//! one to the other. It is independent of the HTTP surface and of the
//! concrete store.

pub mod events;
pub mod models;
pub mod processors;
