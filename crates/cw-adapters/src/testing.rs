//! Testing harness for the adapter seam.
//!
//! [`MockAdapter`] plays scripted batches and injected failures so
//! pipeline behavior can be exercised without any provider. The fixture
//! builders produce raw payloads shaped like the real provider
//! responses the normalizers parse.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use cw_core::entity::EntityType;
use cw_core::source::IntegrationType;
use serde_json::{json, Value};

use crate::traits::{
    Adapter, FetchError, FetchErrorKind, FetchRequest, FetchResult, RawBatch, RawRecord,
};

/// Scriptable in-memory [`Adapter`].
pub struct MockAdapter {
    integration: IntegrationType,
    supported: Vec<EntityType>,
    /// Batch returned on every call for an entity type.
    sticky: RwLock<HashMap<EntityType, RawBatch>>,
    /// One-shot batches, consumed before the sticky batch.
    queued: RwLock<HashMap<EntityType, VecDeque<RawBatch>>>,
    /// Failure injected into the next fetch call, any entity type.
    fail_next: RwLock<Option<(FetchErrorKind, String)>>,
    /// Artificial latency before answering, for timeout tests.
    delay: RwLock<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockAdapter {
    /// Creates a mock for one integration.
    pub fn new(integration: IntegrationType, supported: Vec<EntityType>) -> Self {
        Self {
            integration,
            supported,
            sticky: RwLock::new(HashMap::new()),
            queued: RwLock::new(HashMap::new()),
            fail_next: RwLock::new(None),
            delay: RwLock::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Sets the batch returned on every call for an entity type.
    pub async fn set_batch(&self, entity_type: EntityType, batch: RawBatch) {
        self.sticky.write().await.insert(entity_type, batch);
    }

    /// Queues a batch returned once, ahead of the sticky batch.
    pub async fn queue_batch(&self, entity_type: EntityType, batch: RawBatch) {
        self.queued
            .write()
            .await
            .entry(entity_type)
            .or_default()
            .push_back(batch);
    }

    /// Makes the next fetch call fail.
    pub async fn fail_next(&self, kind: FetchErrorKind, message: impl Into<String>) {
        *self.fail_next.write().await = Some((kind, message.into()));
    }

    /// Adds artificial latency to every fetch call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Number of fetch calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn integration(&self) -> IntegrationType {
        self.integration
    }

    fn supported_entity_types(&self) -> Vec<EntityType> {
        self.supported.clone()
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        _data_source_id: Uuid,
        tenant_id: Uuid,
    ) -> FetchResult<RawBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = *self.delay.read().await {
            tokio::time::sleep(delay).await;
        }

        if let Some((kind, message)) = self.fail_next.write().await.take() {
            return Err(FetchError::new(self.integration, tenant_id, kind, message));
        }

        if !self.supported.contains(&request.entity_type) {
            return Err(FetchError::new(
                self.integration,
                tenant_id,
                FetchErrorKind::UnsupportedEntityType,
                format!("{} is not served by this adapter", request.entity_type),
            ));
        }

        if let Some(queue) = self.queued.write().await.get_mut(&request.entity_type) {
            if let Some(batch) = queue.pop_front() {
                return Ok(batch);
            }
        }

        Ok(self
            .sticky
            .read()
            .await
            .get(&request.entity_type)
            .cloned()
            .unwrap_or_else(RawBatch::empty))
    }
}

// ── Raw payload fixtures ────────────────────────────────────────────────
//
// Shaped like the provider responses the built-in normalizers expect.

/// Datto RMM device payload.
pub fn raw_datto_endpoint(uid: &str, hostname: &str, online: bool, last_seen: &str) -> Value {
    json!({
        "uid": uid,
        "hostname": hostname,
        "operatingSystem": "Microsoft Windows 11 Pro",
        "osVersion": "10.0.26100",
        "online": online,
        "lastSeen": last_seen,
        "agentVersion": "4.9.1",
        "serialNumber": format!("SN-{uid}"),
        "manufacturer": "Dell Inc.",
        "model": "Latitude 5440",
        "encryptionStatus": "encrypted",
        "extIpAddress": "203.0.113.10",
        "intIpAddress": "10.1.20.15"
    })
}

/// NinjaOne device payload.
pub fn raw_ninja_endpoint(id: u64, system_name: &str, offline: bool, last_contact: f64) -> Value {
    json!({
        "id": id,
        "systemName": system_name,
        "os": {"name": "Windows 11", "version": "23H2"},
        "offline": offline,
        "lastContact": last_contact,
        "agentVersion": "5.3.0",
        "serialNumber": format!("NJ-{id}"),
        "ipAddresses": ["10.2.0.4"]
    })
}

/// SentinelOne agent payload.
pub fn raw_sentinelone_endpoint(id: &str, computer_name: &str, active: bool) -> Value {
    json!({
        "id": id,
        "computerName": computer_name,
        "osName": "macOS",
        "osRevision": "14.5",
        "isActive": active,
        "lastActiveDate": "2026-08-01T08:30:00Z",
        "agentVersion": "23.4.2.14",
        "externalIp": "198.51.100.7",
        "networkInterfaces": [{"inet": ["192.168.1.50"]}]
    })
}

/// ConnectWise PSA company payload.
pub fn raw_connectwise_company(id: u64, name: &str, active: bool) -> Value {
    json!({
        "id": id,
        "identifier": name.to_uppercase().replace(' ', ""),
        "name": name,
        "status": {"name": if active { "Active" } else { "Inactive" }},
        "addressLine1": "1 Main St",
        "city": "Springfield",
        "country": "United States",
        "phoneNumber": "555-0100",
        "website": "example.com"
    })
}

/// Microsoft Entra user payload.
pub fn raw_entra_identity(
    id: &str,
    upn: &str,
    enabled: bool,
    mfa_registered: Option<bool>,
    privileged: bool,
) -> Value {
    let mut value = json!({
        "id": id,
        "userPrincipalName": upn,
        "displayName": upn.split('@').next().unwrap_or(upn),
        "mail": upn,
        "accountEnabled": enabled,
        "lastSignInDateTime": "2026-07-30T12:00:00Z",
        "groups": ["All Staff"],
        "assignedLicenses": ["c42b9cae-ea4f-4ab7-9717-81576235ccac"],
        "directoryRoles": if privileged { json!(["Global Administrator"]) } else { json!([]) }
    });
    if let Some(registered) = mfa_registered {
        value["isMfaRegistered"] = json!(registered);
    }
    value
}

/// Duo user payload.
pub fn raw_duo_identity(user_id: &str, username: &str, enrolled: bool) -> Value {
    json!({
        "user_id": user_id,
        "username": username,
        "realname": username,
        "email": format!("{username}@example.com"),
        "status": "active",
        "is_enrolled": enrolled,
        "last_login": 1_753_862_400i64,
        "groups": [{"name": "Duo Users"}],
        "is_admin": false
    })
}

/// Microsoft 365 subscribed-SKU payload.
pub fn raw_m365_license(sku_id: &str, part_number: &str, enabled: u32, consumed: u32) -> Value {
    json!({
        "skuId": sku_id,
        "skuPartNumber": part_number,
        "prepaidUnits": {"enabled": enabled, "suspended": 0, "warning": 0},
        "consumedUnits": consumed,
        "suspendedUnits": 0,
        "isTrial": false,
        "billingType": "paid",
        "unitPriceCents": 2200,
        "nextLifecycleDateTime": "2026-12-01T00:00:00Z"
    })
}

/// Meraki security appliance payload.
pub fn raw_meraki_firewall(serial: &str, name: &str, intrusion_mode: &str) -> Value {
    json!({
        "serial": serial,
        "name": name,
        "model": "MX68",
        "firmware": "MX 18.211",
        "wan1Ip": "203.0.113.77",
        "lastReportedAt": "2026-08-02T03:12:00Z",
        "intrusionMode": intrusion_mode,
        "contentFilteringEnabled": true,
        "firmwareUpToDate": true
    })
}

/// Microsoft Entra directory-role payload.
pub fn raw_entra_role(id: &str, display_name: &str, privileged: bool) -> Value {
    json!({
        "id": id,
        "displayName": display_name,
        "description": format!("{display_name} role"),
        "isBuiltIn": true,
        "isPrivileged": privileged,
        "memberCount": 3
    })
}
