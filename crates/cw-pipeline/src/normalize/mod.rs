//! Normalization: provider payloads → canonical entities.
//!
//! Each supported (entity type, integration) pair registers two pure
//! functions in the [`NormalizerRegistry`]: an external-id extractor the
//! gate uses before normalization, and the normalizer itself. There is
//! no inheritance hierarchy — providers are added by registering
//! functions, and dispatch is a map lookup at call time.
//!
//! Normalizers perform field renaming, enum translation, derived-field
//! computation, and default substitution. They never perform I/O and
//! never fabricate an external id: a record without a provider-native id
//! is a data-quality defect surfaced through logging, not silently
//! normalized.

pub mod endpoint_security;
pub mod identity;
pub mod network;
pub mod productivity;
pub mod psa;
pub mod registry;
pub mod rmm;

pub use registry::{NormalizerEntry, NormalizerRegistry, Processor};

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// A raw record that passed the gate, ready for normalization.
#[derive(Debug, Clone)]
pub struct DataFetchPayload {
    /// The raw provider payload.
    pub raw_data: Value,
    /// The gate's content hash of `raw_data`.
    pub data_hash: String,
    /// Provider-native stable id, extracted during gating.
    pub external_id: String,
    /// Tenant-site resolution, when the provider reported one.
    pub site_id: Option<String>,
}

/// Errors from a single record's normalization.
///
/// Per-record and non-fatal: the record is logged and skipped, the rest
/// of the batch proceeds.
#[derive(Error, Debug, Clone)]
pub enum NormalizeError {
    /// A field the declared input shape requires is missing or has the
    /// wrong type.
    #[error("field '{field}' is missing or malformed")]
    InvalidField {
        /// The offending field.
        field: &'static str,
    },
}

impl NormalizeError {
    /// Creates an invalid-field error.
    pub fn invalid_field(field: &'static str) -> Self {
        Self::InvalidField { field }
    }
}

// ── Extraction helpers shared by the provider normalizers ───────────────

/// Required non-empty string field.
pub(crate) fn req_str(raw: &Value, field: &'static str) -> Result<String, NormalizeError> {
    match raw.get(field).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(NormalizeError::invalid_field(field)),
    }
}

/// Optional non-empty string field.
pub(crate) fn opt_str(raw: &Value, field: &str) -> Option<String> {
    raw.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Optional boolean field.
pub(crate) fn opt_bool(raw: &Value, field: &str) -> Option<bool> {
    raw.get(field).and_then(Value::as_bool)
}

/// Optional unsigned integer field, saturating into `u32`.
pub(crate) fn opt_u32(raw: &Value, field: &str) -> Option<u32> {
    raw.get(field)
        .and_then(Value::as_u64)
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
}

/// Optional RFC 3339 timestamp field.
pub(crate) fn opt_rfc3339(raw: &Value, field: &str) -> Option<DateTime<Utc>> {
    raw.get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// RFC 3339 timestamp with the epoch-zero default.
///
/// A missing or unparseable value becomes the Unix epoch rather than a
/// null so downstream staleness ordering stays total.
pub(crate) fn rfc3339_or_epoch(raw: &Value, field: &str) -> DateTime<Utc> {
    opt_rfc3339(raw, field).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Epoch-seconds timestamp with the epoch-zero default.
pub(crate) fn epoch_secs_or_epoch(raw: &Value, field: &str) -> DateTime<Utc> {
    raw.get(field)
        .and_then(Value::as_f64)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Array-of-strings field, empty when absent.
pub(crate) fn str_array(raw: &Value, field: &str) -> Vec<String> {
    raw.get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
