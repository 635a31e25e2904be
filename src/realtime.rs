//! Realtime event broadcast.
//!
//! A side channel any handler may use to push named events to connected
//! clients. It is not part of the invocation pipeline.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::RealtimeError;

/// Default number of undelivered events buffered per client.
pub const DEFAULT_CAPACITY: usize = 256;

/// Pushes named events to all connected realtime clients.
///
/// `send` resolves once the transport accepted the event, not when clients
/// received it. Concurrent sends are not ordered relative to each other.
#[async_trait]
pub trait Realtime: Send + Sync {
    /// Sends `event_name` with optional `data` to every connected client.
    async fn send(&self, event_name: &str, data: Option<Value>) -> Result<(), RealtimeError>;
}

/// An event as delivered to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeEvent {
    /// Event name
    pub name: String,
    /// Optional payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// In-process broadcast transport.
///
/// Each [`subscribe`](BroadcastRealtime::subscribe) call represents one
/// connected client. Sending with no clients connected succeeds and the
/// event is dropped. A client that falls more than `capacity` events behind
/// misses the oldest ones.
///
/// # Examples
///
/// ```
/// use serverless_kit::realtime::{BroadcastRealtime, Realtime};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let realtime = BroadcastRealtime::new();
/// let mut client = realtime.subscribe();
///
/// realtime.send("order-created", Some(serde_json::json!({"id": 1}))).await.unwrap();
///
/// let event = client.recv().await.unwrap();
/// assert_eq!(event.name, "order-created");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct BroadcastRealtime {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl BroadcastRealtime {
    /// Creates a transport with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a transport buffering `capacity` events per client.
    ///
    /// A zero capacity is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Connects a new client.
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastRealtime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Realtime for BroadcastRealtime {
    async fn send(&self, event_name: &str, data: Option<Value>) -> Result<(), RealtimeError> {
        let event = RealtimeEvent {
            name: event_name.to_string(),
            data,
        };

        match self.sender.send(event) {
            Ok(clients) => {
                tracing::debug!(event = event_name, clients, "realtime event sent");
            }
            Err(_) => {
                tracing::debug!(event = event_name, "realtime event dropped, no clients connected");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn send_without_clients_succeeds() {
        let realtime = BroadcastRealtime::new();
        assert_eq!(realtime.client_count(), 0);
        realtime.send("ping", None).await.unwrap();
    }

    #[tokio::test]
    async fn every_client_receives_event() {
        let realtime = BroadcastRealtime::new();
        let mut a = realtime.subscribe();
        let mut b = realtime.subscribe();

        realtime
            .send("updated", Some(json!({"id": "42"})))
            .await
            .unwrap();

        let expected = RealtimeEvent {
            name: "updated".to_string(),
            data: Some(json!({"id": "42"})),
        };
        assert_eq!(a.recv().await.unwrap(), expected);
        assert_eq!(b.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn usable_as_trait_object() {
        let realtime = BroadcastRealtime::new();
        let mut client = realtime.subscribe();
        let side_channel: &dyn Realtime = &realtime;

        side_channel.send("refresh", None).await.unwrap();

        let event = client.recv().await.unwrap();
        assert_eq!(event.name, "refresh");
        assert!(event.data.is_none());
    }

    /// Transport that refuses every event.
    struct ClosedTransport;

    #[async_trait]
    impl Realtime for ClosedTransport {
        async fn send(&self, event: &str, _data: Option<Value>) -> Result<(), RealtimeError> {
            Err(RealtimeError::Rejected {
                event: event.to_string(),
                reason: "hub closed".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn transport_rejection_reaches_caller() {
        let side_channel: &dyn Realtime = &ClosedTransport;

        let err = side_channel.send("refresh", None).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "realtime transport rejected event 'refresh': hub closed"
        );
    }

    #[test]
    fn event_serializes_without_empty_data() {
        let event = RealtimeEvent {
            name: "refresh".to_string(),
            data: None,
        };
        assert_eq!(serde_json::to_value(&event).unwrap(), json!({"name": "refresh"}));
    }
}
