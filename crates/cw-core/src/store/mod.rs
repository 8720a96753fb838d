//! Persistence seams for the pipeline.
//!
//! The pipeline does not own durable storage; it writes through these
//! traits exactly once per accepted record or alert delta, and reads the
//! minimum it needs (last-known hashes for the gate, current alert state
//! for reconciliation). Both traits are assumed transactional at the
//! single-record grain by their implementations.
//!
//! [`MemoryEntityStore`] and [`MemoryAlertStore`] back tests and
//! single-node deployments, following the repository-trait + in-memory
//! mock pattern used across the codebase.

pub mod error;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryAlertStore, MemoryEntityStore};

use async_trait::async_trait;
use uuid::Uuid;

use crate::alert::{AlertCategory, AlertKey, VersionedAlert};
use crate::entity::{EntityType, NormalizedRecord};

/// Read/write interface for canonical entities and their gate hashes.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Returns the hash recorded by the last successful run for one
    /// external id, if any.
    async fn last_known_hash(
        &self,
        tenant_id: Uuid,
        data_source_id: Uuid,
        entity_type: EntityType,
        external_id: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Upserts one canonical entity record.
    async fn upsert_entity(
        &self,
        tenant_id: Uuid,
        data_source_id: Uuid,
        record: &NormalizedRecord,
    ) -> Result<(), StoreError>;

    /// Records the hash for one external id, making it the gate's
    /// comparison point for the next run.
    async fn record_hash(
        &self,
        tenant_id: Uuid,
        data_source_id: Uuid,
        entity_type: EntityType,
        external_id: &str,
        hash: &str,
    ) -> Result<(), StoreError>;
}

/// Versioned read/write interface for composite alerts.
///
/// Writes are compare-and-swap on the stored version so that concurrent
/// reconcile passes for the same key serialize safely: the loser gets
/// [`StoreError::Conflict`] and retries from a fresh read.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Reads the current state for a key.
    async fn get(&self, key: &AlertKey) -> Result<Option<VersionedAlert>, StoreError>;

    /// Inserts state for a key that must not exist yet.
    ///
    /// Returns [`StoreError::Conflict`] if another writer got there
    /// first.
    async fn insert_new(&self, key: &AlertKey, record: VersionedAlert) -> Result<(), StoreError>;

    /// Replaces the state for a key iff the stored version still equals
    /// `expected_version`. The stored version is incremented on success.
    async fn compare_and_put(
        &self,
        key: &AlertKey,
        expected_version: u64,
        record: VersionedAlert,
    ) -> Result<(), StoreError>;

    /// Lists keys with an open current episode in one category for a
    /// tenant.
    async fn list_open_for_category(
        &self,
        tenant_id: Uuid,
        category: AlertCategory,
    ) -> Result<Vec<AlertKey>, StoreError>;
}
