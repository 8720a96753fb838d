//! Normalizers for the endpoint-security integration (SentinelOne).

use cw_core::entity::{Endpoint, EndpointStatus, EntityPayload};
use serde_json::Value;

use super::{opt_str, req_str, rfc3339_or_epoch, DataFetchPayload, NormalizeError};

/// SentinelOne agent id.
pub(crate) fn sentinelone_endpoint_id(raw: &Value) -> Option<String> {
    opt_str(raw, "id")
}

/// Normalizes a SentinelOne agent into an [`Endpoint`].
pub(crate) fn sentinelone_endpoint(
    payload: &DataFetchPayload,
) -> Result<EntityPayload, NormalizeError> {
    let raw = &payload.raw_data;
    let status = match raw.get("isActive").and_then(Value::as_bool) {
        Some(true) => EndpointStatus::Online,
        Some(false) => EndpointStatus::Offline,
        None => EndpointStatus::Unknown,
    };
    // Interfaces nest their addresses; flatten to one list.
    let internal_ips = raw
        .get("networkInterfaces")
        .and_then(Value::as_array)
        .map(|interfaces| {
            interfaces
                .iter()
                .filter_map(|iface| iface.get("inet").and_then(Value::as_array))
                .flatten()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(EntityPayload::Endpoint(Endpoint {
        hostname: req_str(raw, "computerName")?,
        operating_system: req_str(raw, "osName")?,
        os_version: opt_str(raw, "osRevision"),
        status,
        last_check_in: rfc3339_or_epoch(raw, "lastActiveDate"),
        agent_version: opt_str(raw, "agentVersion"),
        serial_number: opt_str(raw, "serialNumber"),
        manufacturer: None,
        model: None,
        encrypted: None,
        public_ip: opt_str(raw, "externalIp"),
        internal_ips,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_adapters::testing::raw_sentinelone_endpoint;

    fn payload(raw: Value) -> DataFetchPayload {
        DataFetchPayload {
            raw_data: raw,
            data_hash: "h".repeat(64),
            external_id: "s1-1".to_string(),
            site_id: None,
        }
    }

    #[test]
    fn maps_agent_fields() {
        let raw = raw_sentinelone_endpoint("s1-1", "MAC-07", true);
        assert_eq!(sentinelone_endpoint_id(&raw).as_deref(), Some("s1-1"));

        let EntityPayload::Endpoint(endpoint) = sentinelone_endpoint(&payload(raw)).unwrap()
        else {
            panic!("expected endpoint");
        };
        assert_eq!(endpoint.hostname, "MAC-07");
        assert_eq!(endpoint.status, EndpointStatus::Online);
        assert_eq!(endpoint.operating_system, "macOS");
        assert_eq!(endpoint.internal_ips, vec!["192.168.1.50".to_string()]);
        assert_eq!(endpoint.public_ip.as_deref(), Some("198.51.100.7"));
    }

    #[test]
    fn inactive_agent_is_offline() {
        let raw = raw_sentinelone_endpoint("s1-2", "MAC-08", false);
        let EntityPayload::Endpoint(endpoint) = sentinelone_endpoint(&payload(raw)).unwrap()
        else {
            panic!("expected endpoint");
        };
        assert_eq!(endpoint.status, EndpointStatus::Offline);
    }
}
