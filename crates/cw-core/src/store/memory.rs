//! In-memory store implementations.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::StoreError;
use super::{AlertStore, EntityStore};
use crate::alert::{AlertCategory, AlertKey, VersionedAlert};
use crate::entity::{EntityType, NormalizedRecord};

type HashKey = (Uuid, Uuid, EntityType, String);

/// In-memory [`EntityStore`] for tests and single-node use.
#[derive(Default)]
pub struct MemoryEntityStore {
    hashes: Arc<RwLock<HashMap<HashKey, String>>>,
    entities: Arc<RwLock<HashMap<HashKey, NormalizedRecord>>>,
}

impl MemoryEntityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entity records. Test helper.
    pub async fn entity_count(&self) -> usize {
        self.entities.read().await.len()
    }

    /// Returns a stored record by its key. Test helper.
    pub async fn entity(
        &self,
        tenant_id: Uuid,
        data_source_id: Uuid,
        entity_type: EntityType,
        external_id: &str,
    ) -> Option<NormalizedRecord> {
        self.entities
            .read()
            .await
            .get(&(tenant_id, data_source_id, entity_type, external_id.to_string()))
            .cloned()
    }

    /// Clears all stored state. Test helper.
    pub async fn clear(&self) {
        self.hashes.write().await.clear();
        self.entities.write().await.clear();
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn last_known_hash(
        &self,
        tenant_id: Uuid,
        data_source_id: Uuid,
        entity_type: EntityType,
        external_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let hashes = self.hashes.read().await;
        Ok(hashes
            .get(&(tenant_id, data_source_id, entity_type, external_id.to_string()))
            .cloned())
    }

    async fn upsert_entity(
        &self,
        tenant_id: Uuid,
        data_source_id: Uuid,
        record: &NormalizedRecord,
    ) -> Result<(), StoreError> {
        let key = (
            tenant_id,
            data_source_id,
            record.normalized.entity_type(),
            record.external_id.clone(),
        );
        self.entities.write().await.insert(key, record.clone());
        Ok(())
    }

    async fn record_hash(
        &self,
        tenant_id: Uuid,
        data_source_id: Uuid,
        entity_type: EntityType,
        external_id: &str,
        hash: &str,
    ) -> Result<(), StoreError> {
        let key = (tenant_id, data_source_id, entity_type, external_id.to_string());
        self.hashes.write().await.insert(key, hash.to_string());
        Ok(())
    }
}

/// In-memory [`AlertStore`] with CAS semantics.
#[derive(Default)]
pub struct MemoryAlertStore {
    alerts: Arc<RwLock<HashMap<AlertKey, VersionedAlert>>>,
}

impl MemoryAlertStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored alerts. Test helper.
    pub async fn snapshot(&self) -> Vec<(AlertKey, VersionedAlert)> {
        self.alerts
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Clears all stored state. Test helper.
    pub async fn clear(&self) {
        self.alerts.write().await.clear();
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn get(&self, key: &AlertKey) -> Result<Option<VersionedAlert>, StoreError> {
        Ok(self.alerts.read().await.get(key).cloned())
    }

    async fn insert_new(&self, key: &AlertKey, record: VersionedAlert) -> Result<(), StoreError> {
        let mut alerts = self.alerts.write().await;
        if alerts.contains_key(key) {
            return Err(StoreError::conflict(key));
        }
        alerts.insert(key.clone(), record);
        Ok(())
    }

    async fn compare_and_put(
        &self,
        key: &AlertKey,
        expected_version: u64,
        mut record: VersionedAlert,
    ) -> Result<(), StoreError> {
        let mut alerts = self.alerts.write().await;
        match alerts.get(key) {
            Some(stored) if stored.version == expected_version => {
                record.version = expected_version + 1;
                alerts.insert(key.clone(), record);
                Ok(())
            }
            Some(_) => Err(StoreError::conflict(key)),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    async fn list_open_for_category(
        &self,
        tenant_id: Uuid,
        category: AlertCategory,
    ) -> Result<Vec<AlertKey>, StoreError> {
        let alerts = self.alerts.read().await;
        Ok(alerts
            .iter()
            .filter(|(key, record)| {
                key.tenant_id == tenant_id
                    && key.category == category
                    && record.current.is_open()
            })
            .map(|(key, _)| key.clone())
            .collect())
    }
}
