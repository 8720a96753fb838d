//! Normalizers for the network integration (Meraki).

use cw_core::entity::{EntityPayload, Firewall};
use serde_json::Value;

use super::{opt_bool, opt_rfc3339, opt_str, req_str, DataFetchPayload, NormalizeError};

/// Meraki device serial.
pub(crate) fn meraki_firewall_id(raw: &Value) -> Option<String> {
    opt_str(raw, "serial")
}

/// Normalizes a Meraki security appliance into a [`Firewall`].
///
/// Meraki reports intrusion handling as a mode string; only
/// `prevention` counts as IPS enabled.
pub(crate) fn meraki_firewall(payload: &DataFetchPayload) -> Result<EntityPayload, NormalizeError> {
    let raw = &payload.raw_data;
    let ips_enabled = opt_str(raw, "intrusionMode").map(|mode| mode == "prevention");

    Ok(EntityPayload::Firewall(Firewall {
        name: req_str(raw, "name")?,
        model: opt_str(raw, "model"),
        firmware_version: opt_str(raw, "firmware"),
        serial_number: opt_str(raw, "serial"),
        wan_ip: opt_str(raw, "wan1Ip"),
        last_seen: opt_rfc3339(raw, "lastReportedAt"),
        ips_enabled,
        content_filtering_enabled: opt_bool(raw, "contentFilteringEnabled"),
        firmware_current: opt_bool(raw, "firmwareUpToDate"),
    }))
}
