//! Adapter trait and fetch types.

use async_trait::async_trait;
use cw_core::entity::EntityType;
use cw_core::source::IntegrationType;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by an adapter fetch.
///
/// Any unrecovered fetch error is fatal for its (tenant, data source,
/// entity type) run: the run is logged and does not advance to
/// normalization. Retry/backoff for transient provider failures is the
/// adapter's own concern (its HTTP layer); the pipeline never retries a
/// fetch itself.
///
/// Error messages must never contain raw provider payloads or
/// credentials — they surface in scheduler job status.
#[derive(Error, Debug, Clone)]
#[error("fetch from {integration} failed for tenant {tenant_id}: {message}")]
pub struct FetchError {
    /// The integration that failed.
    pub integration: IntegrationType,
    /// The tenant the fetch ran for.
    pub tenant_id: Uuid,
    /// Failure classification.
    pub kind: FetchErrorKind,
    /// Human-readable cause, credential-free.
    pub message: String,
}

impl FetchError {
    /// Builds a fetch error.
    pub fn new(
        integration: IntegrationType,
        tenant_id: Uuid,
        kind: FetchErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            integration,
            tenant_id,
            kind,
            message: message.into(),
        }
    }

    /// Returns whether a later scheduler retry might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            FetchErrorKind::RateLimited | FetchErrorKind::Transport | FetchErrorKind::Cancelled
        )
    }
}

/// Classification of a fetch failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// Credentials rejected or expired.
    Authentication,
    /// Provider rate limit exhausted after the adapter's own backoff.
    RateLimited,
    /// Network or provider-side transport failure.
    Transport,
    /// The caller cancelled the fetch (timeout).
    Cancelled,
    /// The adapter does not serve the requested entity type.
    UnsupportedEntityType,
}

impl FetchErrorKind {
    /// Returns the error code surfaced in job status.
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Authentication => "authentication",
            FetchErrorKind::RateLimited => "rate_limited",
            FetchErrorKind::Transport => "transport",
            FetchErrorKind::Cancelled => "cancelled",
            FetchErrorKind::UnsupportedEntityType => "unsupported_entity_type",
        }
    }
}

/// Result type for adapter operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// What to fetch in one adapter call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    /// The entity type to fetch. A single call returns data for this
    /// type only.
    pub entity_type: EntityType,
    /// Provider-specific pagination cursor from a previous batch.
    pub cursor: Option<String>,
    /// Restrict the fetch to one provider-side site, when supported.
    pub site_filter: Option<String>,
    /// Provider-specific page size hint.
    pub page_size: Option<u32>,
}

impl FetchRequest {
    /// A full-snapshot request for one entity type.
    pub fn snapshot(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            cursor: None,
            site_filter: None,
            page_size: None,
        }
    }
}

/// One raw record as returned by a provider.
///
/// Ephemeral: raw records exist only between fetch and normalization and
/// are never persisted in this form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// The provider payload, untouched.
    pub raw_data: serde_json::Value,
    /// Provider-side site the record belongs to, when reported.
    pub external_site_id: Option<String>,
}

impl RawRecord {
    /// Wraps a payload with no site scoping.
    pub fn new(raw_data: serde_json::Value) -> Self {
        Self {
            raw_data,
            external_site_id: None,
        }
    }

    /// Wraps a payload scoped to a provider site.
    pub fn with_site(raw_data: serde_json::Value, site_id: impl Into<String>) -> Self {
        Self {
            raw_data,
            external_site_id: Some(site_id.into()),
        }
    }
}

/// A batch of raw records from one fetch call.
///
/// "No data" is an empty batch, never an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBatch {
    /// The fetched records.
    pub records: Vec<RawRecord>,
    /// Cursor for the next page, when the batch is cursor-bounded.
    pub next_cursor: Option<String>,
}

impl RawBatch {
    /// An empty, complete batch.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A complete batch of records.
    pub fn complete(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            next_cursor: None,
        }
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One provider integration's fetch capability.
///
/// Implementations log structured entries at call start, success, and
/// failure, and perform no writes to storage or the message bus — the
/// fetch runner owns both. Implementations must be safe to call
/// concurrently for different (tenant, entity type) runs; per-run state
/// (connections, buffers) must not be shared across calls.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// The integration this adapter serves.
    fn integration(&self) -> IntegrationType;

    /// The entity types this adapter can fetch.
    fn supported_entity_types(&self) -> Vec<EntityType>;

    /// Fetches one batch of raw data for the requested entity type.
    async fn fetch(
        &self,
        request: &FetchRequest,
        data_source_id: Uuid,
        tenant_id: Uuid,
    ) -> FetchResult<RawBatch>;
}
