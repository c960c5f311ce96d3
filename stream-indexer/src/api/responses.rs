//! API response types

use serde::{Deserialize, Serialize};

/// Capability descriptor returned by `GET` on each webhook endpoint
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub service: String,
    pub domain: String,
    pub supported_events: Vec<String>,
    pub status: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: u16,
}
