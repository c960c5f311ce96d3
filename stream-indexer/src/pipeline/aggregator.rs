//! Batch result aggregation and the webhook response body

use crate::core::HandleOutcome;
use serde::{Deserialize, Serialize};

/// Outcome of one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub processed: usize,
    pub errors: Vec<String>,
}

impl BatchResult {
    pub fn record(&mut self, outcome: HandleOutcome) {
        if outcome.counts_as_processed() {
            self.processed += 1;
        }
    }

    pub fn block_failed(&mut self, index: u64, error: impl std::fmt::Display) {
        self.errors.push(format!("Block {}: {}", index, error));
    }

    pub fn rollback_failed(&mut self, index: u64, error: impl std::fmt::Display) {
        self.errors.push(format!("Rollback block {}: {}", index, error));
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_response(self, event_type: impl Into<String>) -> WebhookResponse {
        WebhookResponse {
            success: self.success(),
            event_type: event_type.into(),
            processed: self.processed,
            errors: self.errors,
        }
    }
}

/// JSON body returned to the notifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    pub event_type: String,
    pub processed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}
