//! Canonical entity model for Crosswatch.
//!
//! Every provider payload, whatever its shape on the wire, is normalized
//! into one of the canonical entity types defined here. Downstream
//! analyzers only ever see these shapes, never provider-specific JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The entity types the pipeline can ingest and normalize.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Client company / organization record.
    Company,
    /// Managed endpoint (workstation, server, laptop).
    Endpoint,
    /// User or service identity.
    Identity,
    /// Network firewall appliance.
    Firewall,
    /// Software license / subscription SKU.
    License,
    /// Directory role definition.
    Role,
}

impl EntityType {
    /// All entity types, in a stable order.
    pub const ALL: [EntityType; 6] = [
        EntityType::Company,
        EntityType::Endpoint,
        EntityType::Identity,
        EntityType::Firewall,
        EntityType::License,
        EntityType::Role,
    ];

    /// Returns the subject-segment representation (snake_case, plural).
    ///
    /// This is the form used in message bus subjects, e.g.
    /// `<tenant>.endpoints.fetched`.
    pub fn as_subject_str(&self) -> &'static str {
        match self {
            EntityType::Company => "companies",
            EntityType::Endpoint => "endpoints",
            EntityType::Identity => "identities",
            EntityType::Firewall => "firewalls",
            EntityType::License => "licenses",
            EntityType::Role => "roles",
        }
    }

    /// Parses an entity type from its subject-segment representation.
    pub fn from_subject_str(s: &str) -> Option<Self> {
        match s {
            "companies" => Some(EntityType::Company),
            "endpoints" => Some(EntityType::Endpoint),
            "identities" => Some(EntityType::Identity),
            "firewalls" => Some(EntityType::Firewall),
            "licenses" => Some(EntityType::License),
            "roles" => Some(EntityType::Role),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Company => write!(f, "Company"),
            EntityType::Endpoint => write!(f, "Endpoint"),
            EntityType::Identity => write!(f, "Identity"),
            EntityType::Firewall => write!(f, "Firewall"),
            EntityType::License => write!(f, "License"),
            EntityType::Role => write!(f, "Role"),
        }
    }
}

/// A client company as reported by a PSA or RMM platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Company {
    /// Company display name.
    pub name: String,
    /// Primary email/web domain, if the provider reports one.
    pub domain: Option<String>,
    /// Whether the company is an active client.
    pub status: CompanyStatus,
    /// Street address.
    pub address: Option<String>,
    /// City.
    pub city: Option<String>,
    /// Country.
    pub country: Option<String>,
    /// Main phone number.
    pub phone: Option<String>,
    /// Provider-side account number, if distinct from the external id.
    pub account_number: Option<String>,
}

/// Lifecycle status of a client company.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    Active,
    Inactive,
}

/// A managed endpoint as reported by an RMM or endpoint-security platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    /// Device hostname.
    pub hostname: String,
    /// Operating system family (e.g. "Windows", "macOS").
    pub operating_system: String,
    /// OS version string.
    pub os_version: Option<String>,
    /// Current connectivity status.
    pub status: EndpointStatus,
    /// Timestamp of the last agent check-in.
    ///
    /// Providers that omit this field get the Unix epoch rather than a
    /// null, so staleness comparisons have a total ordering.
    pub last_check_in: DateTime<Utc>,
    /// Installed agent version.
    pub agent_version: Option<String>,
    /// Hardware serial number.
    pub serial_number: Option<String>,
    /// Hardware manufacturer.
    pub manufacturer: Option<String>,
    /// Hardware model.
    pub model: Option<String>,
    /// Whether disk encryption is reported as enabled.
    pub encrypted: Option<bool>,
    /// Public IP address observed by the provider.
    pub public_ip: Option<String>,
    /// Internal IP addresses.
    pub internal_ips: Vec<String>,
}

impl Endpoint {
    /// Returns whether the endpoint has ever checked in.
    ///
    /// The epoch-zero default means "never reported", not "checked in
    /// in 1970".
    pub fn has_checked_in(&self) -> bool {
        self.last_check_in > DateTime::<Utc>::UNIX_EPOCH
    }

    /// Returns the age of the last check-in relative to `now`.
    pub fn check_in_age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_check_in
    }
}

/// Connectivity status of an endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    Online,
    Offline,
    Unknown,
}

/// A user or service identity from an identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    /// Primary sign-in identifier (UPN or username).
    pub user_principal_name: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Email address, if distinct from the UPN.
    pub email: Option<String>,
    /// Whether the account is enabled for sign-in.
    pub enabled: bool,
    /// MFA enrollment state.
    ///
    /// `None` means the provider did not report posture for this account,
    /// which analyzers treat differently from an explicit `false`.
    pub mfa_enrolled: Option<bool>,
    /// Timestamp of the last successful sign-in.
    pub last_sign_in: Option<DateTime<Utc>>,
    /// Whether the account holds a privileged directory role.
    pub privileged: bool,
    /// Group memberships.
    pub groups: Vec<String>,
    /// License SKUs assigned to the account.
    pub assigned_license_skus: Vec<String>,
}

impl Identity {
    /// Returns whether the account is enabled but has no confirmed MFA
    /// enrollment.
    pub fn lacks_mfa(&self) -> bool {
        self.enabled && self.mfa_enrolled != Some(true)
    }
}

/// A firewall appliance from a network integration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Firewall {
    /// Appliance name.
    pub name: String,
    /// Hardware model.
    pub model: Option<String>,
    /// Running firmware version.
    pub firmware_version: Option<String>,
    /// Hardware serial number.
    pub serial_number: Option<String>,
    /// WAN-side IP address.
    pub wan_ip: Option<String>,
    /// Timestamp the appliance last reported in.
    pub last_seen: Option<DateTime<Utc>>,
    /// Whether intrusion prevention is enabled.
    pub ips_enabled: Option<bool>,
    /// Whether content filtering is enabled.
    pub content_filtering_enabled: Option<bool>,
    /// Whether the running firmware is the current release.
    pub firmware_current: Option<bool>,
}

/// A license / subscription SKU from a productivity or PSA platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct License {
    /// Provider SKU identifier.
    pub sku: String,
    /// Human-readable product name.
    pub product_name: String,
    /// Total purchased seats.
    pub total_seats: u32,
    /// Seats currently assigned to users.
    pub assigned_seats: u32,
    /// Seats assigned to suspended/disabled users.
    pub suspended_seats: u32,
    /// Per-seat monthly cost in cents, when known.
    pub monthly_cost_cents: Option<u64>,
    /// Billing classification derived from provider capability flags.
    pub cost_policy: LicenseCostPolicy,
    /// Next renewal date.
    pub renewal_date: Option<DateTime<Utc>>,
}

impl License {
    /// Seats purchased but not assigned to anyone.
    pub fn unassigned_seats(&self) -> u32 {
        self.total_seats.saturating_sub(self.assigned_seats)
    }

    /// Fraction of purchased seats going unused, in `[0.0, 1.0]`.
    ///
    /// Returns 0.0 for zero-seat SKUs.
    pub fn waste_ratio(&self) -> f64 {
        if self.total_seats == 0 {
            return 0.0;
        }
        f64::from(self.unassigned_seats()) / f64::from(self.total_seats)
    }

    /// Monthly spend on unassigned seats, in cents.
    pub fn wasted_monthly_cost_cents(&self) -> Option<u64> {
        self.monthly_cost_cents
            .map(|per_seat| per_seat * u64::from(self.unassigned_seats()))
    }
}

/// Billing classification of a license SKU.
///
/// Collapsed from provider-specific capability/cost flags (e.g. the
/// Microsoft 365 `capabilityStatus` field) into one pipeline-wide policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LicenseCostPolicy {
    /// Paid SKU; unassigned seats are real spend.
    Billable,
    /// Bundled or free SKU; never flagged for waste.
    NonBillable,
    /// Trial SKU; excluded from waste analysis until converted.
    Trial,
}

/// A directory role definition from an identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    /// Role name.
    pub name: String,
    /// Role description.
    pub description: Option<String>,
    /// Whether the role grants privileged/administrative access.
    pub privileged: bool,
    /// Whether the role is built into the directory (vs. custom).
    pub built_in: bool,
    /// Number of members holding the role, when reported.
    pub member_count: Option<u32>,
}

/// One canonical entity of any type, for transport through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "attributes", rename_all = "snake_case")]
pub enum EntityPayload {
    Company(Company),
    Endpoint(Endpoint),
    Identity(Identity),
    Firewall(Firewall),
    License(License),
    Role(Role),
}

impl EntityPayload {
    /// Returns the entity type of the wrapped payload.
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityPayload::Company(_) => EntityType::Company,
            EntityPayload::Endpoint(_) => EntityType::Endpoint,
            EntityPayload::Identity(_) => EntityType::Identity,
            EntityPayload::Firewall(_) => EntityType::Firewall,
            EntityPayload::License(_) => EntityType::License,
            EntityPayload::Role(_) => EntityType::Role,
        }
    }
}

/// A normalized entity record: the canonical payload plus its provenance
/// envelope.
///
/// Created once by a processor and never mutated afterwards. The envelope
/// carries everything downstream consumers need for idempotence and
/// scoping:
///
/// - `external_id` is the provider-native identifier, stable and unique
///   per (tenant, integration, entity type) over time.
/// - `hash` is the content-hash gate's digest of `raw`; redelivered
///   records with a known hash can be skipped by any consumer.
/// - `site_id` scopes the record to a tenant site when the provider
///   reported one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedEntity<T> {
    /// Provider-native stable identifier.
    pub external_id: String,
    /// The raw provider payload the record was normalized from.
    pub raw: serde_json::Value,
    /// Content hash of `raw`, as computed by the gate.
    pub hash: String,
    /// Tenant-site scope, when resolved.
    pub site_id: Option<String>,
    /// The canonical payload.
    pub normalized: T,
}

/// The concrete record type carried on the message bus.
pub type NormalizedRecord = NormalizedEntity<EntityPayload>;
