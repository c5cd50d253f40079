//! Alert surface: structured events emitted on operationally meaningful
//! status transitions.
//!
//! Delivery mechanics live with the collaborators: the sink fans events out
//! over a broadcast channel, and anything from a UI websocket to a logger can
//! subscribe without coupling to the orchestrator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use crate::status::Status;

/// Emitted exactly when derivation reports an alerting transition.
#[derive(Debug, Clone, Serialize)]
pub struct AlertEvent {
    pub target_id: i32,
    pub name: String,
    pub old_status: Option<Status>,
    pub new_status: Status,
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    /// One-line human summary used as the default notification message.
    pub fn summary(&self) -> String {
        let old = self
            .old_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "NONE".to_string());
        format!(
            "ALERT: '{}' transitioned {} -> {} at {}",
            self.name,
            old,
            self.new_status,
            self.timestamp.to_rfc3339()
        )
    }
}

#[derive(Clone)]
pub struct AlertSink {
    tx: broadcast::Sender<AlertEvent>,
}

impl AlertSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event. Having no subscribers is not an error; events are
    /// fire-and-forget from the orchestrator's point of view.
    pub fn emit(&self, event: AlertEvent) {
        info!(
            target_id = event.target_id,
            name = %event.name,
            new_status = %event.new_status,
            "alert transition"
        );
        let _ = self.tx.send(event);
    }
}

impl Default for AlertSink {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let sink = AlertSink::new(8);
        let mut rx = sink.subscribe();
        sink.emit(AlertEvent {
            target_id: 7,
            name: "portal".into(),
            old_status: Some(Status::Stable),
            new_status: Status::Down,
            timestamp: Utc::now(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.target_id, 7);
        assert_eq!(event.new_status, Status::Down);
    }

    #[test]
    fn emitting_without_subscribers_is_fine() {
        let sink = AlertSink::new(8);
        sink.emit(AlertEvent {
            target_id: 1,
            name: "lonely".into(),
            old_status: None,
            new_status: Status::Down,
            timestamp: Utc::now(),
        });
    }
}
