//! In-memory bus implementation.
//!
//! Backs tests and single-node deployments. Delivery is fan-out to every
//! subscription whose pattern matches the published subject; consumer
//! groups are tracked for health reporting but do not load-balance (every
//! matching subscription sees every message, which over-approximates the
//! at-least-once contract consumers must already tolerate).

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, trace, warn};

use super::error::BusError;
use super::subject::{Subject, SubjectPattern};
use super::types::{BusHealth, Message, MessageId, Subscription};
use super::MessageBus;

const SUBSCRIPTION_BUFFER: usize = 256;

struct SubscriberEntry {
    pattern: SubjectPattern,
    group: String,
    sender: mpsc::Sender<Message>,
}

/// In-memory [`MessageBus`] with wildcard pattern matching.
pub struct InMemoryBus {
    subscribers: Arc<RwLock<Vec<SubscriberEntry>>>,
    /// Monotonic source for message ids.
    sequence: AtomicU64,
    /// Published-message counts per subject, for test assertions.
    published: Arc<RwLock<HashMap<String, u64>>>,
    /// Acknowledged message ids per subject.
    acknowledged: Arc<RwLock<HashMap<String, HashSet<MessageId>>>>,
}

impl InMemoryBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
            sequence: AtomicU64::new(0),
            published: Arc::new(RwLock::new(HashMap::new())),
            acknowledged: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Total messages published across all subjects.
    pub fn total_published(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Messages published on one subject.
    pub async fn published_count(&self, subject: &Subject) -> u64 {
        self.published
            .read()
            .await
            .get(&subject.to_string())
            .copied()
            .unwrap_or(0)
    }

    /// Whether a message has been acknowledged.
    pub async fn is_acknowledged(&self, subject: &Subject, id: &MessageId) -> bool {
        self.acknowledged
            .read()
            .await
            .get(&subject.to_string())
            .is_some_and(|set| set.contains(id))
    }

    /// Resets all bus state. Test helper.
    pub async fn clear(&self) {
        self.subscribers.write().await.clear();
        self.published.write().await.clear();
        self.acknowledged.write().await.clear();
    }

    fn next_id(&self) -> MessageId {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        MessageId::new(format!("mem-{n}"))
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBus")
            .field("published", &self.sequence)
            .finish()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, subject: &Subject, payload: &[u8]) -> Result<MessageId, BusError> {
        let id = self.next_id();
        let message = Message {
            id: id.clone(),
            subject: *subject,
            payload: payload.to_vec(),
            timestamp: Utc::now(),
        };

        {
            let mut published = self.published.write().await;
            *published.entry(subject.to_string()).or_insert(0) += 1;
        }

        let mut subscribers = self.subscribers.write().await;
        let mut delivered = 0usize;
        // Closed receivers are pruned as we go, so a dropped Subscription
        // stops costing anything.
        subscribers.retain(|entry| {
            if !entry.pattern.matches(subject) {
                return true;
            }
            match entry.sender.try_send(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        subject = %subject,
                        group = %entry.group,
                        "subscriber buffer full, message dropped for this subscriber"
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(
                        subject = %subject,
                        group = %entry.group,
                        "pruning closed subscription"
                    );
                    false
                }
            }
        });

        trace!(subject = %subject, message_id = %id, delivered, "published message");
        Ok(id)
    }

    async fn subscribe(
        &self,
        pattern: SubjectPattern,
        group: &str,
    ) -> Result<Subscription, BusError> {
        if group.is_empty() || group.contains('.') {
            return Err(BusError::InvalidGroup(format!(
                "group name '{group}' must be a non-empty name without dots"
            )));
        }

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.subscribers.write().await.push(SubscriberEntry {
            pattern,
            group: group.to_string(),
            sender: tx,
        });

        debug!(pattern = %pattern, group, "created subscription");
        Ok(Subscription::new(rx))
    }

    async fn acknowledge(&self, subject: &Subject, id: &MessageId) -> Result<(), BusError> {
        let mut acknowledged = self.acknowledged.write().await;
        acknowledged
            .entry(subject.to_string())
            .or_default()
            .insert(id.clone());
        trace!(subject = %subject, message_id = %id, "acknowledged message");
        Ok(())
    }

    async fn health_check(&self) -> Result<BusHealth, BusError> {
        let subscribers = self.subscribers.read().await;
        let live = subscribers
            .iter()
            .filter(|entry| !entry.sender.is_closed())
            .count() as u32;
        Ok(BusHealth::healthy(0, live))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use std::time::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let bus = InMemoryBus::new();
        let subject = Subject::fetched(Uuid::new_v4(), EntityType::Endpoint);
        bus.publish(&subject, b"payload").await.unwrap();
        assert_eq!(bus.published_count(&subject).await, 1);
    }

    #[tokio::test]
    async fn exact_subscription_receives_message() {
        let bus = InMemoryBus::new();
        let subject = Subject::fetched(Uuid::new_v4(), EntityType::Endpoint);

        let mut sub = bus
            .subscribe(SubjectPattern::exact(subject), "worker")
            .await
            .unwrap();
        let id = bus.publish(&subject, b"hello").await.unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("timeout")
            .expect("no message");
        assert_eq!(msg.id, id);
        assert_eq!(msg.payload, b"hello");
        assert_eq!(msg.subject, subject);
    }

    #[tokio::test]
    async fn wildcard_subscription_spans_tenants() {
        let bus = InMemoryBus::new();
        let mut sub = bus
            .subscribe(SubjectPattern::all_fetched(EntityType::Endpoint), "analyzer")
            .await
            .unwrap();

        let t1 = Subject::fetched(Uuid::new_v4(), EntityType::Endpoint);
        let t2 = Subject::fetched(Uuid::new_v4(), EntityType::Endpoint);
        let other = Subject::fetched(Uuid::new_v4(), EntityType::Identity);

        bus.publish(&t1, b"one").await.unwrap();
        bus.publish(&other, b"skipped").await.unwrap();
        bus.publish(&t2, b"two").await.unwrap();

        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert_eq!(first.payload, b"one");
        assert_eq!(second.payload, b"two");
        assert!(sub.try_recv().is_err());
    }

    #[tokio::test]
    async fn separate_groups_both_receive() {
        let bus = InMemoryBus::new();
        let subject = Subject::analysis(Uuid::new_v4(), EntityType::License);

        let mut a = bus
            .subscribe(SubjectPattern::exact(subject), "aggregator")
            .await
            .unwrap();
        let mut b = bus
            .subscribe(SubjectPattern::all_analysis(), "audit")
            .await
            .unwrap();

        bus.publish(&subject, b"finding").await.unwrap();
        assert_eq!(a.recv().await.unwrap().payload, b"finding");
        assert_eq!(b.recv().await.unwrap().payload, b"finding");
    }

    #[tokio::test]
    async fn acknowledgment_is_tracked() {
        let bus = InMemoryBus::new();
        let subject = Subject::fetched(Uuid::new_v4(), EntityType::Firewall);
        let mut sub = bus
            .subscribe(SubjectPattern::exact(subject), "worker")
            .await
            .unwrap();

        bus.publish(&subject, b"x").await.unwrap();
        let msg = sub.recv().await.unwrap();
        assert!(!bus.is_acknowledged(&subject, &msg.id).await);

        bus.acknowledge(&subject, &msg.id).await.unwrap();
        assert!(bus.is_acknowledged(&subject, &msg.id).await);
    }

    #[tokio::test]
    async fn dropped_subscription_is_pruned() {
        let bus = InMemoryBus::new();
        let subject = Subject::fetched(Uuid::new_v4(), EntityType::Company);

        let sub = bus
            .subscribe(SubjectPattern::exact(subject), "worker")
            .await
            .unwrap();
        drop(sub);

        bus.publish(&subject, b"x").await.unwrap();
        let health = bus.health_check().await.unwrap();
        assert_eq!(health.subscriber_count, 0);
    }

    #[tokio::test]
    async fn rejects_bad_group_names() {
        let bus = InMemoryBus::new();
        let err = bus
            .subscribe(SubjectPattern::all_analysis(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::InvalidGroup(_)));
    }
}
