//! In-process real-time publisher feeding the websocket endpoint

use crate::core::{IndexerResult, RealtimePublisher};
use crate::domain::models::RealtimeEvent;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl RealtimePublisher for BroadcastPublisher {
    async fn publish(&self, event: &RealtimeEvent) -> IndexerResult<()> {
        // Sending only fails when nobody is subscribed
        if self.sender.send(event.clone()).is_err() {
            trace!(channel = %event.channel, "no realtime subscribers");
        }
        Ok(())
    }
}
