//! End-to-end pipeline tests over the in-memory bus and stores.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use cw_adapters::testing::{raw_datto_endpoint, raw_entra_identity, MockAdapter};
use cw_adapters::{AdapterRegistry, FetchErrorKind, RawBatch, RawRecord};
use cw_analyzers::{AlertAggregator, MfaPostureAnalyzer};
use cw_core::alert::{AlertCategory, AlertKey, AlertStatus, VersionedAlert};
use cw_core::analysis::Severity;
use cw_core::bus::{
    BusError, BusHealth, FetchedEvent, InMemoryBus, MessageBus, MessageId, Subject,
    SubjectPattern, Subscription,
};
use cw_core::entity::EntityType;
use cw_core::source::{DataSource, IntegrationType};
use cw_core::store::{AlertStore, MemoryAlertStore, MemoryEntityStore};
use cw_pipeline::{
    AggregatorWorker, AnalyzerWorker, FetchRunner, NormalizerRegistry, PipelineConfig, RunError,
};

fn endpoint_runner(
    adapter: Arc<MockAdapter>,
    bus: Arc<dyn MessageBus>,
    entities: Arc<MemoryEntityStore>,
    config: PipelineConfig,
) -> FetchRunner {
    let mut adapters = AdapterRegistry::new();
    adapters.register(adapter);
    FetchRunner::new(
        adapters,
        Arc::new(NormalizerRegistry::with_defaults()),
        bus,
        entities,
        config,
    )
}

fn datto_source(tenant: Uuid) -> DataSource {
    DataSource::new(tenant, IntegrationType::DattoRmm, serde_json::json!({}))
}

async fn wait_for_alert(
    store: &MemoryAlertStore,
    key: &AlertKey,
    predicate: impl Fn(&VersionedAlert) -> bool,
) -> VersionedAlert {
    for _ in 0..200 {
        if let Some(alert) = store.get(key).await.unwrap() {
            if predicate(&alert) {
                return alert;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("alert for {key} never reached the expected state");
}

#[tokio::test]
async fn second_identical_run_publishes_nothing() {
    let tenant = Uuid::new_v4();
    let adapter = Arc::new(MockAdapter::new(
        IntegrationType::DattoRmm,
        vec![EntityType::Endpoint],
    ));
    adapter
        .set_batch(
            EntityType::Endpoint,
            RawBatch::complete(vec![
                RawRecord::new(raw_datto_endpoint("d-1", "WS-001", true, "2026-08-01T00:00:00Z")),
                RawRecord::new(raw_datto_endpoint("d-2", "WS-002", true, "2026-08-01T00:00:00Z")),
            ]),
        )
        .await;

    let bus = Arc::new(InMemoryBus::new());
    let entities = Arc::new(MemoryEntityStore::new());
    let runner = endpoint_runner(
        adapter,
        bus.clone(),
        entities.clone(),
        PipelineConfig::default(),
    );
    let source = datto_source(tenant);
    let subject = Subject::fetched(tenant, EntityType::Endpoint);

    let first = runner
        .run(tenant, &source, EntityType::Endpoint)
        .await
        .unwrap();
    assert_eq!(first.records_fetched, 2);
    assert_eq!(first.records_changed, 2);
    assert!(first.published);
    assert_eq!(bus.published_count(&subject).await, 1);
    assert_eq!(entities.entity_count().await, 2);

    // Same snapshot again: the gate short-circuits everything.
    let second = runner
        .run(tenant, &source, EntityType::Endpoint)
        .await
        .unwrap();
    assert_eq!(second.records_fetched, 2);
    assert_eq!(second.records_changed, 0);
    assert!(!second.published);
    assert_eq!(bus.published_count(&subject).await, 1);
}

#[tokio::test]
async fn unchanged_record_is_excluded_from_published_batch() {
    let tenant = Uuid::new_v4();
    let adapter = Arc::new(MockAdapter::new(
        IntegrationType::DattoRmm,
        vec![EntityType::Endpoint],
    ));
    let unchanged = raw_datto_endpoint("d-1", "WS-001", true, "2026-08-01T00:00:00Z");
    adapter
        .queue_batch(
            EntityType::Endpoint,
            RawBatch::complete(vec![RawRecord::new(unchanged.clone())]),
        )
        .await;
    adapter
        .set_batch(
            EntityType::Endpoint,
            RawBatch::complete(vec![
                RawRecord::new(unchanged),
                RawRecord::new(raw_datto_endpoint("d-2", "WS-002", true, "2026-08-01T00:00:00Z")),
                RawRecord::new(raw_datto_endpoint("d-3", "WS-003", false, "2026-08-01T00:00:00Z")),
            ]),
        )
        .await;

    let bus = Arc::new(InMemoryBus::new());
    let entities = Arc::new(MemoryEntityStore::new());
    let runner = endpoint_runner(
        adapter,
        bus.clone(),
        entities.clone(),
        PipelineConfig::default(),
    );
    let source = datto_source(tenant);
    let subject = Subject::fetched(tenant, EntityType::Endpoint);

    // Seed d-1 into stored state.
    runner
        .run(tenant, &source, EntityType::Endpoint)
        .await
        .unwrap();

    let mut subscription = bus
        .subscribe(SubjectPattern::exact(subject), "probe")
        .await
        .unwrap();

    // Three fetched, one with a hash matching stored state.
    let report = runner
        .run(tenant, &source, EntityType::Endpoint)
        .await
        .unwrap();
    assert_eq!(report.records_fetched, 3);
    assert_eq!(report.records_changed, 2);

    let message = tokio::time::timeout(Duration::from_secs(1), subscription.recv())
        .await
        .expect("timeout")
        .expect("no message");
    let event = FetchedEvent::from_bytes(&message.payload).unwrap();
    assert_eq!(event.entities.len(), 2);
    let ids: Vec<&str> = event.entities.iter().map(|e| e.external_id.as_str()).collect();
    assert!(ids.contains(&"d-2") && ids.contains(&"d-3"));
    assert_eq!(bus.published_count(&subject).await, 2);
}

#[tokio::test]
async fn mfa_findings_flow_into_alerts_and_resolve() {
    let tenant = Uuid::new_v4();
    let adapter = Arc::new(MockAdapter::new(
        IntegrationType::MicrosoftEntra,
        vec![EntityType::Identity],
    ));
    // U1 is privileged without MFA; U2 is enrolled.
    adapter
        .queue_batch(
            EntityType::Identity,
            RawBatch::complete(vec![
                RawRecord::new(raw_entra_identity("u-1", "admin@example.com", true, Some(false), true)),
                RawRecord::new(raw_entra_identity("u-2", "user@example.com", true, Some(true), false)),
            ]),
        )
        .await;
    // Later snapshot: U1 enrolled (changed), U2 unchanged.
    adapter
        .set_batch(
            EntityType::Identity,
            RawBatch::complete(vec![
                RawRecord::new(raw_entra_identity("u-1", "admin@example.com", true, Some(true), true)),
                RawRecord::new(raw_entra_identity("u-2", "user@example.com", true, Some(true), false)),
            ]),
        )
        .await;

    let bus: Arc<InMemoryBus> = Arc::new(InMemoryBus::new());
    let entities = Arc::new(MemoryEntityStore::new());
    let alerts = Arc::new(MemoryAlertStore::new());

    let bus_dyn: Arc<dyn MessageBus> = bus.clone();
    let _analyzer =
        AnalyzerWorker::new(Arc::new(MfaPostureAnalyzer::new()), bus_dyn.clone()).spawn();
    let _aggregator = AggregatorWorker::new(
        Arc::new(AlertAggregator::new(alerts.clone())),
        bus_dyn.clone(),
    )
    .spawn();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut adapters = AdapterRegistry::new();
    adapters.register(adapter);
    let runner = FetchRunner::new(
        adapters,
        Arc::new(NormalizerRegistry::with_defaults()),
        bus_dyn,
        entities,
        PipelineConfig::default(),
    );
    let source = DataSource::new(tenant, IntegrationType::MicrosoftEntra, serde_json::json!({}));

    runner
        .run(tenant, &source, EntityType::Identity)
        .await
        .unwrap();

    // U1 opens at High; U2 never gets an alert.
    let u1_key = AlertKey::new(tenant, "u-1", AlertCategory::MfaGap);
    let alert = wait_for_alert(&alerts, &u1_key, |a| a.current.is_open()).await;
    assert_eq!(alert.current.severity, Severity::High);

    let u2_key = AlertKey::new(tenant, "u-2", AlertCategory::MfaGap);
    assert!(alerts.get(&u2_key).await.unwrap().is_none());

    // U1 enrolls; the changed record flows through and resolves.
    runner
        .run(tenant, &source, EntityType::Identity)
        .await
        .unwrap();
    let resolved = wait_for_alert(&alerts, &u1_key, |a| !a.current.is_open()).await;
    assert_eq!(resolved.current.status, AlertStatus::Resolved);
    assert!(resolved.current.resolved_at.is_some());
}

/// Bus wrapper that fails publishes on demand.
struct FlakyBus {
    inner: InMemoryBus,
    fail_publish: AtomicBool,
}

#[async_trait]
impl MessageBus for FlakyBus {
    async fn publish(&self, subject: &Subject, payload: &[u8]) -> Result<MessageId, BusError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(BusError::connection("bus unavailable"));
        }
        self.inner.publish(subject, payload).await
    }

    async fn subscribe(
        &self,
        pattern: SubjectPattern,
        group: &str,
    ) -> Result<Subscription, BusError> {
        self.inner.subscribe(pattern, group).await
    }

    async fn acknowledge(&self, subject: &Subject, id: &MessageId) -> Result<(), BusError> {
        self.inner.acknowledge(subject, id).await
    }

    async fn health_check(&self) -> Result<BusHealth, BusError> {
        self.inner.health_check().await
    }
}

#[tokio::test]
async fn publish_failure_leaves_records_undelivered() {
    let tenant = Uuid::new_v4();
    let adapter = Arc::new(MockAdapter::new(
        IntegrationType::DattoRmm,
        vec![EntityType::Endpoint],
    ));
    adapter
        .set_batch(
            EntityType::Endpoint,
            RawBatch::complete(vec![RawRecord::new(raw_datto_endpoint(
                "d-1", "WS-001", true, "2026-08-01T00:00:00Z",
            ))]),
        )
        .await;

    let bus = Arc::new(FlakyBus {
        inner: InMemoryBus::new(),
        fail_publish: AtomicBool::new(true),
    });
    let entities = Arc::new(MemoryEntityStore::new());
    let runner = endpoint_runner(
        adapter,
        bus.clone(),
        entities.clone(),
        PipelineConfig::default(),
    );
    let source = datto_source(tenant);

    let err = runner
        .run(tenant, &source, EntityType::Endpoint)
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Publish(_)));
    assert_eq!(err.error_code(), "publish_failed");
    // No hash was recorded, so the record is still undelivered.
    assert_eq!(entities.entity_count().await, 0);

    // Scheduler retries once the bus is back: the full batch flows.
    bus.fail_publish.store(false, Ordering::SeqCst);
    let report = runner
        .run(tenant, &source, EntityType::Endpoint)
        .await
        .unwrap();
    assert_eq!(report.records_changed, 1);
    assert!(report.published);
    assert_eq!(entities.entity_count().await, 1);
}

#[tokio::test]
async fn fetch_timeout_fails_the_run_without_publishing() {
    let tenant = Uuid::new_v4();
    let adapter = Arc::new(MockAdapter::new(
        IntegrationType::DattoRmm,
        vec![EntityType::Endpoint],
    ));
    adapter
        .set_batch(
            EntityType::Endpoint,
            RawBatch::complete(vec![RawRecord::new(raw_datto_endpoint(
                "d-1", "WS-001", true, "2026-08-01T00:00:00Z",
            ))]),
        )
        .await;
    adapter.set_delay(Duration::from_millis(250)).await;

    let bus = Arc::new(InMemoryBus::new());
    let entities = Arc::new(MemoryEntityStore::new());
    let config = PipelineConfig {
        fetch_timeout: Duration::from_millis(50),
        ..PipelineConfig::default()
    };
    let runner = endpoint_runner(adapter, bus.clone(), entities.clone(), config);
    let source = datto_source(tenant);

    let err = runner
        .run(tenant, &source, EntityType::Endpoint)
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Timeout { stage: "fetch" }));
    assert_eq!(err.error_code(), "timeout");
    assert_eq!(bus.total_published(), 0);
    assert_eq!(entities.entity_count().await, 0);
}

#[tokio::test]
async fn fetch_failure_is_fatal_for_the_run() {
    let tenant = Uuid::new_v4();
    let adapter = Arc::new(MockAdapter::new(
        IntegrationType::DattoRmm,
        vec![EntityType::Endpoint],
    ));
    adapter
        .fail_next(FetchErrorKind::Authentication, "token rejected")
        .await;

    let bus = Arc::new(InMemoryBus::new());
    let entities = Arc::new(MemoryEntityStore::new());
    let runner = endpoint_runner(
        adapter,
        bus.clone(),
        entities,
        PipelineConfig::default(),
    );
    let source = datto_source(tenant);

    let err = runner
        .run(tenant, &source, EntityType::Endpoint)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "authentication");
    assert_eq!(bus.total_published(), 0);
}

#[tokio::test]
async fn disabled_data_source_is_rejected() {
    let tenant = Uuid::new_v4();
    let adapter = Arc::new(MockAdapter::new(
        IntegrationType::DattoRmm,
        vec![EntityType::Endpoint],
    ));
    let bus = Arc::new(InMemoryBus::new());
    let entities = Arc::new(MemoryEntityStore::new());
    let runner = endpoint_runner(adapter, bus, entities, PipelineConfig::default());

    let mut source = datto_source(tenant);
    source.disable();

    let err = runner
        .run(tenant, &source, EntityType::Endpoint)
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::InactiveDataSource { .. }));
    assert_eq!(err.error_code(), "inactive_data_source");
}

#[tokio::test]
async fn unregistered_normalizer_is_nonfatal() {
    let tenant = Uuid::new_v4();
    // Datto RMM serves firewalls here, but no firewall normalizer is
    // registered for it.
    let adapter = Arc::new(MockAdapter::new(
        IntegrationType::DattoRmm,
        vec![EntityType::Firewall],
    ));
    adapter
        .set_batch(
            EntityType::Firewall,
            RawBatch::complete(vec![RawRecord::new(serde_json::json!({"uid": "fw-1"}))]),
        )
        .await;

    let bus = Arc::new(InMemoryBus::new());
    let entities = Arc::new(MemoryEntityStore::new());
    let runner = endpoint_runner(
        adapter,
        bus.clone(),
        entities,
        PipelineConfig::default(),
    );
    let source = datto_source(tenant);

    let report = runner
        .run(tenant, &source, EntityType::Firewall)
        .await
        .unwrap();
    assert_eq!(report.records_fetched, 1);
    assert_eq!(report.records_changed, 0);
    assert!(!report.published);
    assert_eq!(bus.total_published(), 0);
}
