//! WebSocket feed of real-time events
//!
//! Clients pick channels with `/ws?topics=marketplace,user:SP...`; without
//! `topics` every event is forwarded.

use super::ApiState;
use crate::domain::models::RealtimeEvent;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Query parameters for a WebSocket connection
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Comma separated channel names
    pub topics: Option<String>,
}

impl WsQuery {
    fn topics(&self) -> HashSet<String> {
        self.topics
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn wanted(topics: &HashSet<String>, event: &RealtimeEvent) -> bool {
    topics.is_empty() || topics.contains(&event.channel)
}

/// Handle WebSocket upgrade
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<ApiState>,
) -> Response {
    let topics = params.topics();
    info!(topics = ?topics, "websocket connection requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state, topics))
}

async fn handle_socket(socket: WebSocket, state: ApiState, topics: HashSet<String>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.realtime.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket subscriber lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !wanted(&topics, &event) {
                continue;
            }
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "realtime event not serializable");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                debug!("websocket close received");
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }
    info!("websocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_topic_filter() {
        let query = WsQuery {
            topics: Some("marketplace, user:SP_A,".to_string()),
        };
        let topics = query.topics();
        assert_eq!(topics.len(), 2);

        assert!(wanted(&topics, &RealtimeEvent::new("user:SP_A", "notification", json!({}))));
        assert!(!wanted(&topics, &RealtimeEvent::new("treasury", "fee-collected", json!({}))));
        assert!(wanted(&HashSet::new(), &RealtimeEvent::new("treasury", "fee-collected", json!({}))));
    }
}
