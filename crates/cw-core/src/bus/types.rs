//! Message and subscription types for the bus abstraction.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::subject::Subject;

/// Unique identifier for a published message.
///
/// The underlying format is transport-specific (a counter for the
/// in-memory bus, `<timestamp>-<sequence>` for stream-backed transports).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    /// Creates a message id from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message delivered to a subscriber.
///
/// The payload is raw bytes — in practice a serialized [`FetchedEvent`]
/// or `AnalysisEvent`. Consumers deserialize, validate required fields,
/// and log-and-skip anything malformed rather than crashing the loop.
///
/// [`FetchedEvent`]: super::events::FetchedEvent
#[derive(Debug, Clone)]
pub struct Message {
    /// Transport-assigned identifier, used for acknowledgment.
    pub id: MessageId,
    /// The subject the message was published on.
    pub subject: Subject,
    /// Serialized event payload.
    pub payload: Vec<u8>,
    /// Publish timestamp, set by the transport.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Attempts to deserialize the payload as JSON.
    pub fn deserialize<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// A live subscription to a subject pattern.
///
/// Dropping the subscription closes the channel; the transport stops
/// delivering and releases its resources.
pub struct Subscription {
    receiver: mpsc::Receiver<Message>,
}

impl Subscription {
    /// Wraps a receiver into a subscription.
    pub fn new(receiver: mpsc::Receiver<Message>) -> Self {
        Self { receiver }
    }

    /// Receives the next message, or `None` once the subscription closes.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Non-blocking receive for tests and drain loops.
    pub fn try_recv(&mut self) -> Result<Message, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("receiver", &"<mpsc::Receiver>")
            .finish()
    }
}

/// Health snapshot of the bus, for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusHealth {
    /// Whether the transport connection is live.
    pub connected: bool,
    /// Messages waiting to be consumed.
    pub pending_messages: u64,
    /// Active subscribers across all patterns.
    pub subscriber_count: u32,
}

impl BusHealth {
    /// A healthy snapshot with the given counters.
    pub fn healthy(pending_messages: u64, subscriber_count: u32) -> Self {
        Self {
            connected: true,
            pending_messages,
            subscriber_count,
        }
    }

    /// A disconnected snapshot.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            pending_messages: 0,
            subscriber_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use uuid::Uuid;

    #[test]
    fn message_payload_deserializes() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Probe {
            value: u32,
        }

        let message = Message {
            id: MessageId::new("m-1"),
            subject: Subject::fetched(Uuid::new_v4(), EntityType::Endpoint),
            payload: serde_json::to_vec(&serde_json::json!({"value": 7})).unwrap(),
            timestamp: Utc::now(),
        };
        let probe: Probe = message.deserialize().unwrap();
        assert_eq!(probe, Probe { value: 7 });
    }

    #[test]
    fn health_constructors() {
        assert!(BusHealth::healthy(0, 2).connected);
        assert!(!BusHealth::disconnected().connected);
    }
}
