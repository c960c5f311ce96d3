//! Fan-out payloads: durable notifications and real-time events

use super::Document;
use crate::core::{Collection, Domain, ProcessingContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Shared real-time topics
pub const MARKETPLACE_TOPIC: &str = "marketplace";
pub const TREASURY_TOPIC: &str = "treasury";
pub const SYSTEM_TOPIC: &str = "system";

pub fn user_channel(user: &str) -> String {
    format!("user:{}", user)
}

pub fn stream_channel(stream_id: u128) -> String {
    format!("stream:{}", stream_id)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Message content before it is addressed to a user
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub action_url: Option<String>,
}

impl NotificationDraft {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: Priority::Normal,
            action_url: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }
}

/// Durable per-user notification record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user: String,
    pub domain: Domain,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub action_url: Option<String>,
    pub read: bool,
    pub block_height: Option<u64>,
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user: &str, domain: Domain, draft: NotificationDraft, context: Option<&ProcessingContext>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user: user.to_string(),
            domain,
            title: draft.title,
            body: draft.body,
            priority: draft.priority,
            action_url: draft.action_url,
            read: false,
            block_height: context.map(ProcessingContext::block_height),
            tx_hash: context.map(|c| c.tx_hash.clone()),
            created_at: Utc::now(),
        }
    }
}

impl Document for Notification {
    const COLLECTION: Collection = Collection::Notifications;

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// Ephemeral push addressed to a user channel or a shared topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeEvent {
    pub channel: String,
    pub event: String,
    pub payload: Value,
    pub block_height: Option<u64>,
    pub tx_hash: Option<String>,
}

impl RealtimeEvent {
    pub fn new(channel: impl Into<String>, event: impl Into<String>, payload: Value) -> Self {
        Self {
            channel: channel.into(),
            event: event.into(),
            payload,
            block_height: None,
            tx_hash: None,
        }
    }

    pub fn at(mut self, context: &ProcessingContext) -> Self {
        self.block_height = Some(context.block_height());
        self.tx_hash = Some(context.tx_hash.clone());
        self
    }
}
