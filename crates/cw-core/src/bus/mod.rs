//! Message bus abstraction connecting the pipeline stages.
//!
//! Adapters → processors hand off in-process, but everything downstream
//! of a fetch run travels over this bus: fetch runs publish normalized
//! batches, analyzers consume them and publish findings, and the alert
//! aggregator consumes findings across all analyzers.
//!
//! ```text
//! fetch run ──▶ <tenant>.<entity>.fetched ──▶ analyzers
//! analyzers ──▶ <tenant>.<entity>.analysis ──▶ alert aggregator
//! ```
//!
//! Subjects are hierarchical ([`Subject`]) and subscriptions take
//! wildcard patterns ([`SubjectPattern`]), so one analyzer deployment can
//! serve every tenant for its entity type.
//!
//! # Delivery contract
//!
//! At-least-once per subscriber group. Handlers must be idempotent with
//! respect to a record's content hash: the gate prevents re-publication
//! of unchanged records upstream, and the alert aggregator's keyed upsert
//! absorbs redelivery downstream. A handler failure on one message must
//! never terminate the subscription loop.
//!
//! This module is the durable, multi-consumer transport; it is not an
//! in-process observer list, and nothing here should be used for
//! UI-facing notification fan-out.

pub mod error;
pub mod events;
pub mod memory;
pub mod subject;
pub mod types;

pub use error::{BusError, BusResult};
pub use events::{FetchedEvent, EVENT_SCHEMA_VERSION};
pub use memory::InMemoryBus;
pub use subject::{Stage, Subject, SubjectPattern};
pub use types::{BusHealth, Message, MessageId, Subscription};

use async_trait::async_trait;

/// A durable publish/subscribe transport.
///
/// Implementations must be `Send + Sync` and safe to share behind an
/// `Arc` across concurrently executing pipeline runs; the bus client is
/// constructed once and injected into whichever component publishes or
/// subscribes (no global connection singleton).
#[async_trait]
pub trait MessageBus: Send + Sync + 'static {
    /// Publishes a payload on a subject, returning the assigned id.
    async fn publish(&self, subject: &Subject, payload: &[u8]) -> Result<MessageId, BusError>;

    /// Subscribes to every subject matching `pattern`, as part of a
    /// consumer group.
    async fn subscribe(
        &self,
        pattern: SubjectPattern,
        group: &str,
    ) -> Result<Subscription, BusError>;

    /// Acknowledges successful processing of a message.
    ///
    /// Unacknowledged messages are redelivered by transports that
    /// support it; handlers therefore ack only after their side effects
    /// have been applied.
    async fn acknowledge(&self, subject: &Subject, id: &MessageId) -> Result<(), BusError>;

    /// Reports transport health for monitoring.
    async fn health_check(&self) -> Result<BusHealth, BusError>;
}
