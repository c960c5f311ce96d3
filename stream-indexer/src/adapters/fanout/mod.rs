//! Fan-out to durable notifications and real-time channels
//!
//! Both sinks are fire-and-forget: a failed delivery is logged and counted,
//! never returned to the handler that triggered it.

pub mod broadcast;
pub mod redis;

use crate::adapters::storage::Projection;
use crate::core::{
    Domain, IndexerResult, NotificationSink, ProcessingContext, RealtimePublisher, WriteScope,
    UNKNOWN_PRINCIPAL,
};
use crate::domain::models::{user_channel, Notification, NotificationDraft, RealtimeEvent};
use crate::metrics::Metrics;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub use self::broadcast::BroadcastPublisher;
pub use self::redis::RedisPublisher;

#[derive(Clone)]
pub struct FanOut {
    sink: Arc<dyn NotificationSink>,
    realtime: Arc<dyn RealtimePublisher>,
    metrics: Option<Metrics>,
}

impl FanOut {
    pub fn new(sink: Arc<dyn NotificationSink>, realtime: Arc<dyn RealtimePublisher>) -> Self {
        Self {
            sink,
            realtime,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Deliver a notification to one user and push it to the user's channel
    ///
    /// Unresolved users (`unknown`) are skipped.
    pub async fn notify(
        &self,
        domain: Domain,
        user: &str,
        draft: NotificationDraft,
        context: Option<&ProcessingContext>,
    ) {
        if user.is_empty() || user == UNKNOWN_PRINCIPAL {
            debug!(%domain, title = %draft.title, "skipping notification for unresolved user");
            return;
        }

        let notification = Notification::new(user, domain, draft, context);
        if let Err(e) = self.sink.deliver(&notification).await {
            warn!(%domain, user, error = %e, "notification delivery failed");
            self.record_failure("notification");
        }

        let payload = match serde_json::to_value(&notification) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%domain, user, error = %e, "notification not serializable");
                return;
            }
        };
        let mut event = RealtimeEvent::new(user_channel(user), "notification", payload);
        if let Some(context) = context {
            event = event.at(context);
        }
        self.broadcast(event).await;
    }

    /// Push an event to a user channel or shared topic
    pub async fn broadcast(&self, event: RealtimeEvent) {
        if let Err(e) = self.realtime.publish(&event).await {
            warn!(channel = %event.channel, event = %event.event, error = %e, "realtime publish failed");
            self.record_failure("realtime");
        }
    }

    fn record_failure(&self, sink: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.fanout_failures.with_label_values(&[sink]).inc();
        }
    }
}

/// Notification sink writing to the `notifications` collection
pub struct StoreNotificationSink {
    projection: Projection,
}

impl StoreNotificationSink {
    pub fn new(projection: Projection) -> Self {
        Self { projection }
    }
}

#[async_trait]
impl NotificationSink for StoreNotificationSink {
    async fn deliver(&self, notification: &Notification) -> IndexerResult<()> {
        self.projection
            .upsert(notification.domain, &WriteScope::OffChain, notification)
            .await
    }
}

/// Publishes every event to each inner publisher
pub struct MultiPublisher {
    publishers: Vec<Arc<dyn RealtimePublisher>>,
}

impl MultiPublisher {
    pub fn new(publishers: Vec<Arc<dyn RealtimePublisher>>) -> Self {
        Self { publishers }
    }
}

#[async_trait]
impl RealtimePublisher for MultiPublisher {
    async fn publish(&self, event: &RealtimeEvent) -> IndexerResult<()> {
        let mut first_error = None;
        for publisher in &self.publishers {
            if let Err(e) = publisher.publish(event).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
