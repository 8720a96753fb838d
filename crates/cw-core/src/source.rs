//! Integration catalog and tenant data-source types.
//!
//! Integrations describe the external platforms Crosswatch can ingest
//! from; data sources are a tenant's configured connections to them. Both
//! are owned by the tenant-management subsystem and are read-only inputs
//! to the pipeline.

use crate::entity::EntityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel for credentials that never expire.
pub const CREDENTIALS_NEVER_EXPIRE: DateTime<Utc> = DateTime::<Utc>::MAX_UTC;

/// External platforms Crosswatch can ingest from.
///
/// This is a closed catalog: adding a provider means adding a variant
/// here and registering its normalizers, not subclassing anything.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationType {
    /// Datto RMM endpoint management.
    DattoRmm,
    /// NinjaOne RMM endpoint management.
    NinjaOne,
    /// ConnectWise PSA ticketing and account management.
    ConnectwisePsa,
    /// Microsoft Entra ID directory.
    MicrosoftEntra,
    /// Microsoft 365 subscription management.
    Microsoft365,
    /// Duo Security MFA.
    Duo,
    /// SentinelOne endpoint security console.
    SentinelOne,
    /// Cisco Meraki network dashboard.
    Meraki,
}

impl IntegrationType {
    /// Returns the database-compatible string representation (snake_case).
    pub fn as_db_str(&self) -> &'static str {
        match self {
            IntegrationType::DattoRmm => "datto_rmm",
            IntegrationType::NinjaOne => "ninja_one",
            IntegrationType::ConnectwisePsa => "connectwise_psa",
            IntegrationType::MicrosoftEntra => "microsoft_entra",
            IntegrationType::Microsoft365 => "microsoft_365",
            IntegrationType::Duo => "duo",
            IntegrationType::SentinelOne => "sentinel_one",
            IntegrationType::Meraki => "meraki",
        }
    }

    /// Parses an integration type from a database string.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "datto_rmm" => Some(IntegrationType::DattoRmm),
            "ninja_one" => Some(IntegrationType::NinjaOne),
            "connectwise_psa" => Some(IntegrationType::ConnectwisePsa),
            "microsoft_entra" => Some(IntegrationType::MicrosoftEntra),
            "microsoft_365" => Some(IntegrationType::Microsoft365),
            "duo" => Some(IntegrationType::Duo),
            "sentinel_one" => Some(IntegrationType::SentinelOne),
            "meraki" => Some(IntegrationType::Meraki),
            _ => None,
        }
    }

    /// Returns the category of platform this integration belongs to.
    pub fn category(&self) -> IntegrationCategory {
        match self {
            IntegrationType::DattoRmm | IntegrationType::NinjaOne => IntegrationCategory::Rmm,
            IntegrationType::ConnectwisePsa => IntegrationCategory::Psa,
            IntegrationType::MicrosoftEntra | IntegrationType::Duo => {
                IntegrationCategory::IdentityProvider
            }
            IntegrationType::Microsoft365 => IntegrationCategory::Productivity,
            IntegrationType::SentinelOne => IntegrationCategory::EndpointSecurity,
            IntegrationType::Meraki => IntegrationCategory::Network,
        }
    }
}

impl std::fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrationType::DattoRmm => write!(f, "Datto RMM"),
            IntegrationType::NinjaOne => write!(f, "NinjaOne"),
            IntegrationType::ConnectwisePsa => write!(f, "ConnectWise PSA"),
            IntegrationType::MicrosoftEntra => write!(f, "Microsoft Entra"),
            IntegrationType::Microsoft365 => write!(f, "Microsoft 365"),
            IntegrationType::Duo => write!(f, "Duo"),
            IntegrationType::SentinelOne => write!(f, "SentinelOne"),
            IntegrationType::Meraki => write!(f, "Meraki"),
        }
    }
}

/// Category of platform an integration belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationCategory {
    Rmm,
    Psa,
    IdentityProvider,
    Productivity,
    EndpointSecurity,
    Network,
}

/// Catalog entry describing one external provider.
///
/// Immutable at pipeline runtime; read-only reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    /// URL-safe slug, matching `IntegrationType::as_db_str`.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Integration type.
    pub integration_type: IntegrationType,
    /// Entity types this provider can supply.
    pub supported_entity_types: Vec<EntityType>,
    /// Whether the integration is available for new data sources.
    pub is_active: bool,
}

impl Integration {
    /// Returns whether this integration can supply the given entity type.
    pub fn supports(&self, entity_type: EntityType) -> bool {
        self.supported_entity_types.contains(&entity_type)
    }
}

/// Lifecycle status of a tenant data source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceStatus {
    #[default]
    Active,
    Inactive,
}

impl DataSourceStatus {
    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DataSourceStatus::Active => "active",
            DataSourceStatus::Inactive => "inactive",
        }
    }
}

/// A tenant-scoped connection to one integration.
///
/// Exactly one data source participates in any fetch call. Created on
/// integration enablement; disabled rather than deleted so history is
/// preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// The integration this source connects to.
    pub integration: IntegrationType,
    /// Lifecycle status.
    pub status: DataSourceStatus,
    /// Opaque per-integration settings (endpoints, region, scopes).
    pub config: serde_json::Value,
    /// When the stored credentials expire.
    ///
    /// [`CREDENTIALS_NEVER_EXPIRE`] means they never do.
    pub credential_expiration_at: DateTime<Utc>,
    /// Whether this is the tenant's primary source for the integration.
    ///
    /// At most one primary per integration per tenant; enforced by the
    /// tenant-management layer.
    pub is_primary: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp; set while the source is disabled.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl DataSource {
    /// Creates a new active data source for a tenant.
    pub fn new(tenant_id: Uuid, integration: IntegrationType, config: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            integration,
            status: DataSourceStatus::Active,
            config,
            credential_expiration_at: CREDENTIALS_NEVER_EXPIRE,
            is_primary: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Disables the source, stamping `deleted_at`.
    pub fn disable(&mut self) {
        self.status = DataSourceStatus::Inactive;
        let now = Utc::now();
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    /// Re-enables a previously disabled source.
    pub fn re_enable(&mut self) {
        self.status = DataSourceStatus::Active;
        self.deleted_at = None;
        self.updated_at = Utc::now();
    }

    /// Returns whether fetch runs may use this source.
    pub fn is_operational(&self) -> bool {
        self.status == DataSourceStatus::Active && self.deleted_at.is_none()
    }

    /// Returns whether the stored credentials have expired as of `now`.
    pub fn credentials_expired(&self, now: DateTime<Utc>) -> bool {
        self.credential_expiration_at <= now
    }
}
