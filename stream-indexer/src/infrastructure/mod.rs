//! Infrastructure layer
//!
//! Service orchestration: connecting backends and wiring processors

pub mod service_container;

pub use service_container::{Backends, ServiceContainer};
