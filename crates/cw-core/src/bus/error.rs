//! Error types for the message bus abstraction.

use thiserror::Error;

/// Errors that can occur in message bus operations.
///
/// The taxonomy covers the failure modes shared by the candidate
/// transports (in-memory, Redis Streams, NATS): connection-level faults
/// are transient and retryable, data-shape faults are permanent.
#[derive(Error, Debug, Clone)]
pub enum BusError {
    /// Failed to reach the bus at all. Transient; retry with backoff.
    #[error("bus connection error: {0}")]
    Connection(String),

    /// The operation exceeded its deadline.
    #[error("bus operation timed out: {0}")]
    Timeout(String),

    /// The payload could not be serialized or deserialized.
    #[error("payload serialization error: {0}")]
    Serialization(String),

    /// The subscription channel has closed; re-subscribe to continue.
    #[error("subscription closed: {0}")]
    SubscriptionClosed(String),

    /// The subject or pattern string is malformed.
    #[error("invalid subject: {0}")]
    InvalidSubject(String),

    /// Acknowledgment referenced a message the bus does not know.
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// The consumer group name is malformed or unknown.
    #[error("invalid consumer group: {0}")]
    InvalidGroup(String),

    /// Catch-all for transport-specific failures.
    #[error("bus error: {0}")]
    Unknown(String),
}

impl BusError {
    /// Creates a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a subscription-closed error.
    pub fn subscription_closed(msg: impl Into<String>) -> Self {
        Self::SubscriptionClosed(msg.into())
    }

    /// Creates an invalid-subject error.
    pub fn invalid_subject(msg: impl Into<String>) -> Self {
        Self::InvalidSubject(msg.into())
    }

    /// Creates a message-not-found error.
    pub fn message_not_found(msg: impl Into<String>) -> Self {
        Self::MessageNotFound(msg.into())
    }

    /// Returns whether the operation can be retried as-is.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::SubscriptionClosed(_)
        )
    }

    /// Returns the error kind as a static string for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
            Self::SubscriptionClosed(_) => "subscription_closed",
            Self::InvalidSubject(_) => "invalid_subject",
            Self::MessageNotFound(_) => "message_not_found",
            Self::InvalidGroup(_) => "invalid_group",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for message bus operations.
pub type BusResult<T> = Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transience_classification() {
        assert!(BusError::connection("refused").is_transient());
        assert!(BusError::timeout("5s elapsed").is_transient());
        assert!(!BusError::serialization("bad json").is_transient());
        assert!(!BusError::invalid_subject("x").is_transient());
    }

    #[test]
    fn kind_strings() {
        assert_eq!(BusError::connection("x").kind(), "connection");
        assert_eq!(BusError::invalid_subject("x").kind(), "invalid_subject");
    }

    #[test]
    fn serde_error_converts() {
        let err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let bus_err: BusError = err.into();
        assert!(matches!(bus_err, BusError::Serialization(_)));
    }
}
