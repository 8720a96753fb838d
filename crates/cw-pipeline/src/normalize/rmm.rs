//! Normalizers for the RMM integrations (Datto RMM, NinjaOne).

use cw_core::entity::{Endpoint, EndpointStatus, EntityPayload};
use serde_json::Value;

use super::{
    epoch_secs_or_epoch, opt_str, req_str, rfc3339_or_epoch, str_array, DataFetchPayload,
    NormalizeError,
};

/// Datto RMM device id (`uid`).
pub(crate) fn datto_endpoint_id(raw: &Value) -> Option<String> {
    opt_str(raw, "uid")
}

/// Normalizes a Datto RMM device into an [`Endpoint`].
pub(crate) fn datto_endpoint(payload: &DataFetchPayload) -> Result<EntityPayload, NormalizeError> {
    let raw = &payload.raw_data;
    let status = match raw.get("online").and_then(Value::as_bool) {
        Some(true) => EndpointStatus::Online,
        Some(false) => EndpointStatus::Offline,
        None => EndpointStatus::Unknown,
    };
    let encrypted = match opt_str(raw, "encryptionStatus").as_deref() {
        Some("encrypted") => Some(true),
        Some("notEncrypted") => Some(false),
        _ => None,
    };

    Ok(EntityPayload::Endpoint(Endpoint {
        hostname: req_str(raw, "hostname")?,
        operating_system: req_str(raw, "operatingSystem")?,
        os_version: opt_str(raw, "osVersion"),
        status,
        last_check_in: rfc3339_or_epoch(raw, "lastSeen"),
        agent_version: opt_str(raw, "agentVersion"),
        serial_number: opt_str(raw, "serialNumber"),
        manufacturer: opt_str(raw, "manufacturer"),
        model: opt_str(raw, "model"),
        encrypted,
        public_ip: opt_str(raw, "extIpAddress"),
        internal_ips: opt_str(raw, "intIpAddress").into_iter().collect(),
    }))
}

/// NinjaOne device id (numeric `id`).
pub(crate) fn ninja_endpoint_id(raw: &Value) -> Option<String> {
    raw.get("id").and_then(Value::as_u64).map(|n| n.to_string())
}

/// Normalizes a NinjaOne device into an [`Endpoint`].
pub(crate) fn ninja_endpoint(payload: &DataFetchPayload) -> Result<EntityPayload, NormalizeError> {
    let raw = &payload.raw_data;
    let os = raw.get("os").cloned().unwrap_or(Value::Null);
    let status = match raw.get("offline").and_then(Value::as_bool) {
        Some(true) => EndpointStatus::Offline,
        Some(false) => EndpointStatus::Online,
        None => EndpointStatus::Unknown,
    };

    Ok(EntityPayload::Endpoint(Endpoint {
        hostname: req_str(raw, "systemName")?,
        operating_system: req_str(&os, "name")?,
        os_version: opt_str(&os, "version"),
        status,
        last_check_in: epoch_secs_or_epoch(raw, "lastContact"),
        agent_version: opt_str(raw, "agentVersion"),
        serial_number: opt_str(raw, "serialNumber"),
        manufacturer: opt_str(raw, "manufacturer"),
        model: opt_str(raw, "model"),
        encrypted: None,
        public_ip: None,
        internal_ips: str_array(raw, "ipAddresses"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use cw_adapters::testing::{raw_datto_endpoint, raw_ninja_endpoint};

    fn payload(raw: Value, external_id: &str) -> DataFetchPayload {
        DataFetchPayload {
            raw_data: raw,
            data_hash: "h".repeat(64),
            external_id: external_id.to_string(),
            site_id: None,
        }
    }

    #[test]
    fn datto_maps_online_flag_and_encryption() {
        let raw = raw_datto_endpoint("d-1", "WS-001", true, "2026-08-01T00:00:00Z");
        assert_eq!(datto_endpoint_id(&raw).as_deref(), Some("d-1"));

        let EntityPayload::Endpoint(endpoint) = datto_endpoint(&payload(raw, "d-1")).unwrap()
        else {
            panic!("expected endpoint");
        };
        assert_eq!(endpoint.hostname, "WS-001");
        assert_eq!(endpoint.status, EndpointStatus::Online);
        assert_eq!(endpoint.encrypted, Some(true));
        assert!(endpoint.has_checked_in());
    }

    #[test]
    fn datto_missing_last_seen_defaults_to_epoch() {
        let mut raw = raw_datto_endpoint("d-2", "WS-002", false, "2026-08-01T00:00:00Z");
        raw.as_object_mut().unwrap().remove("lastSeen");

        let EntityPayload::Endpoint(endpoint) = datto_endpoint(&payload(raw, "d-2")).unwrap()
        else {
            panic!("expected endpoint");
        };
        assert_eq!(endpoint.last_check_in, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(endpoint.status, EndpointStatus::Offline);
    }

    #[test]
    fn datto_requires_hostname() {
        let mut raw = raw_datto_endpoint("d-3", "WS-003", true, "2026-08-01T00:00:00Z");
        raw.as_object_mut().unwrap().remove("hostname");
        assert!(datto_endpoint(&payload(raw, "d-3")).is_err());
    }

    #[test]
    fn ninja_maps_numeric_id_and_offline_flag() {
        let raw = raw_ninja_endpoint(42, "SRV-01", true, 1_753_862_400.0);
        assert_eq!(ninja_endpoint_id(&raw).as_deref(), Some("42"));

        let EntityPayload::Endpoint(endpoint) = ninja_endpoint(&payload(raw, "42")).unwrap()
        else {
            panic!("expected endpoint");
        };
        assert_eq!(endpoint.hostname, "SRV-01");
        assert_eq!(endpoint.status, EndpointStatus::Offline);
        assert_eq!(endpoint.operating_system, "Windows 11");
        assert_eq!(endpoint.last_check_in.timestamp(), 1_753_862_400);
        assert_eq!(endpoint.internal_ips, vec!["10.2.0.4".to_string()]);
    }
}
