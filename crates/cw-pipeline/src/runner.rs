//! Per-run fetch orchestration.
//!
//! One run covers one (tenant, data source, entity type): adapter fetch,
//! content-hash gate, normalization, one publish, then store writes.
//! The stages inside a run are sequential and short-lived; runs for
//! different tenants and entity types share no mutable state and execute
//! concurrently.
//!
//! # Atomicity
//!
//! Nothing is considered delivered until the batch publish succeeds.
//! Hashes are recorded only afterwards, so a run that fails at publish
//! re-processes the whole batch on the scheduler's retry instead of
//! silently dropping records the gate would now skip.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use cw_adapters::{AdapterRegistry, FetchError, FetchRequest};
use cw_core::bus::{BusError, FetchedEvent, MessageBus, Subject};
use cw_core::entity::EntityType;
use cw_core::hash::{content_hash, should_process};
use cw_core::source::{DataSource, IntegrationType};
use cw_core::store::{EntityStore, StoreError};

use crate::config::PipelineConfig;
use crate::normalize::{DataFetchPayload, NormalizerRegistry, Processor};

/// Errors that fail an entire fetch run.
///
/// Per-record problems (hash failures, missing ids, normalize failures)
/// never appear here — they are logged and isolated inside the run.
#[derive(Error, Debug)]
pub enum RunError {
    /// The adapter fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A stage exceeded its configured deadline.
    #[error("{stage} timed out")]
    Timeout {
        /// The stage that hit its deadline.
        stage: &'static str,
    },

    /// The batch could not be published.
    #[error("publish failed: {0}")]
    Publish(BusError),

    /// A store write failed after publish.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The data source is disabled or soft-deleted.
    #[error("data source {data_source_id} is not operational")]
    InactiveDataSource {
        /// The offending data source.
        data_source_id: Uuid,
    },

    /// The data source belongs to a different tenant than the run.
    #[error("data source {data_source_id} does not belong to tenant {tenant_id}")]
    TenantMismatch {
        /// The data source.
        data_source_id: Uuid,
        /// The tenant the run was invoked for.
        tenant_id: Uuid,
    },

    /// No adapter is registered for the integration.
    #[error("no adapter registered for {0}")]
    NoAdapter(IntegrationType),
}

impl RunError {
    /// Error code surfaced in the scheduler's job status.
    pub fn error_code(&self) -> &'static str {
        match self {
            RunError::Fetch(err) => err.kind.as_str(),
            RunError::Timeout { .. } => "timeout",
            RunError::Publish(_) => "publish_failed",
            RunError::Store(_) => "store_failed",
            RunError::InactiveDataSource { .. } => "inactive_data_source",
            RunError::TenantMismatch { .. } => "tenant_mismatch",
            RunError::NoAdapter(_) => "no_adapter",
        }
    }
}

/// Outcome of a successful run, reported back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Records the adapter returned.
    pub records_fetched: usize,
    /// Records that passed the gate and normalized cleanly.
    pub records_changed: usize,
    /// Whether a `fetched` event was published.
    pub published: bool,
}

/// Executes fetch runs.
///
/// Cheap to clone and safe to share: all collaborators are behind
/// `Arc`s, and `run` holds no state between invocations.
#[derive(Clone)]
pub struct FetchRunner {
    adapters: AdapterRegistry,
    registry: Arc<NormalizerRegistry>,
    bus: Arc<dyn MessageBus>,
    entities: Arc<dyn EntityStore>,
    config: PipelineConfig,
}

impl FetchRunner {
    /// Wires a runner from its collaborators.
    pub fn new(
        adapters: AdapterRegistry,
        registry: Arc<NormalizerRegistry>,
        bus: Arc<dyn MessageBus>,
        entities: Arc<dyn EntityStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            adapters,
            registry,
            bus,
            entities,
            config,
        }
    }

    /// Runs one fetch for (tenant, data source, entity type).
    ///
    /// Invoked by the external scheduler, which owns retry/backoff and
    /// job-status persistence; this method reports one run's outcome
    /// and nothing more.
    #[instrument(skip(self, data_source), fields(
        tenant_id = %tenant_id,
        data_source_id = %data_source.id,
        integration = %data_source.integration,
        entity_type = %entity_type,
    ))]
    pub async fn run(
        &self,
        tenant_id: Uuid,
        data_source: &DataSource,
        entity_type: EntityType,
    ) -> Result<RunReport, RunError> {
        if data_source.tenant_id != tenant_id {
            return Err(RunError::TenantMismatch {
                data_source_id: data_source.id,
                tenant_id,
            });
        }
        if !data_source.is_operational() {
            return Err(RunError::InactiveDataSource {
                data_source_id: data_source.id,
            });
        }
        if data_source.credentials_expired(Utc::now()) {
            warn!("credentials expired for data source, fetch will likely fail auth");
        }

        let adapter = self
            .adapters
            .get(data_source.integration)
            .ok_or(RunError::NoAdapter(data_source.integration))?;

        info!("fetch run starting");
        let request = FetchRequest::snapshot(entity_type);
        let batch = timeout(
            self.config.fetch_timeout,
            adapter.fetch(&request, data_source.id, tenant_id),
        )
        .await
        .map_err(|_| RunError::Timeout { stage: "fetch" })??;
        let records_fetched = batch.len();
        info!(records_fetched, "fetch complete");

        let Some(entry) = self.registry.get(entity_type, data_source.integration) else {
            // Non-fatal: same contract as the processor's lookup miss.
            tracing::error!(
                error_code = "NORMALIZER_NOT_FOUND",
                "no normalizer registered, skipping batch"
            );
            return Ok(RunReport {
                records_fetched,
                records_changed: 0,
                published: false,
            });
        };

        // Gate: hash, extract id, compare against last known hash.
        let mut changed: Vec<DataFetchPayload> = Vec::new();
        for record in batch.records {
            let hash = match content_hash(&record.raw_data) {
                Ok(hash) => hash,
                Err(err) => {
                    warn!(
                        error_code = "HASH_COMPUTATION_FAILED",
                        error = %err,
                        "dropping unhashable record"
                    );
                    continue;
                }
            };
            let Some(external_id) = (entry.external_id)(&record.raw_data) else {
                warn!(
                    error_code = "MISSING_EXTERNAL_ID",
                    "dropping record with no provider-native id"
                );
                continue;
            };
            let previous = timeout(
                self.config.store_timeout,
                self.entities
                    .last_known_hash(tenant_id, data_source.id, entity_type, &external_id),
            )
            .await
            .map_err(|_| RunError::Timeout { stage: "hash lookup" })??;

            if !should_process(&hash, previous.as_deref()) {
                trace!(external_id = %external_id, "record unchanged, short-circuiting");
                continue;
            }
            changed.push(DataFetchPayload {
                raw_data: record.raw_data,
                data_hash: hash,
                external_id,
                site_id: record.external_site_id,
            });
        }
        debug!(gated = changed.len(), "gate complete");

        if changed.is_empty() {
            return Ok(RunReport {
                records_fetched,
                records_changed: 0,
                published: false,
            });
        }

        let processor = Processor::new(entity_type, Arc::clone(&self.registry));
        let records = processor.normalize(data_source.integration, &changed);
        if records.is_empty() {
            return Ok(RunReport {
                records_fetched,
                records_changed: 0,
                published: false,
            });
        }
        let records_changed = records.len();

        let event = FetchedEvent::new(
            tenant_id,
            data_source.id,
            data_source.integration,
            entity_type,
            records,
        );
        let payload = event.to_bytes().map_err(RunError::Publish)?;
        let subject = Subject::fetched(tenant_id, entity_type);
        timeout(self.config.publish_timeout, self.bus.publish(&subject, &payload))
            .await
            .map_err(|_| RunError::Timeout { stage: "publish" })?
            .map_err(RunError::Publish)?;
        info!(records_changed, subject = %subject, "published fetched batch");

        // Only after a successful publish do the records count as
        // delivered: upsert each entity and advance its gate hash.
        for record in &event.entities {
            timeout(
                self.config.store_timeout,
                self.entities.upsert_entity(tenant_id, data_source.id, record),
            )
            .await
            .map_err(|_| RunError::Timeout { stage: "entity upsert" })??;
            timeout(
                self.config.store_timeout,
                self.entities.record_hash(
                    tenant_id,
                    data_source.id,
                    entity_type,
                    &record.external_id,
                    &record.hash,
                ),
            )
            .await
            .map_err(|_| RunError::Timeout { stage: "hash record" })??;
        }

        Ok(RunReport {
            records_fetched,
            records_changed,
            published: true,
        })
    }
}
