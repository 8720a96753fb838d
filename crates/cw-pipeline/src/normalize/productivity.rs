//! Normalizers for the productivity integration (Microsoft 365).

use cw_core::entity::{EntityPayload, License, LicenseCostPolicy};
use serde_json::Value;

use super::{opt_rfc3339, opt_str, opt_u32, req_str, DataFetchPayload, NormalizeError};

/// Microsoft 365 SKU id (`skuId`).
pub(crate) fn m365_license_id(raw: &Value) -> Option<String> {
    opt_str(raw, "skuId")
}

/// Normalizes a Microsoft 365 subscribed SKU into a [`License`].
///
/// The provider's trial and billing-type flags collapse into the single
/// [`LicenseCostPolicy`] the waste analyzer keys on.
pub(crate) fn m365_license(payload: &DataFetchPayload) -> Result<EntityPayload, NormalizeError> {
    let raw = &payload.raw_data;
    let part_number = req_str(raw, "skuPartNumber")?;
    let prepaid = raw.get("prepaidUnits").cloned().unwrap_or(Value::Null);

    let cost_policy = if raw.get("isTrial").and_then(Value::as_bool).unwrap_or(false) {
        LicenseCostPolicy::Trial
    } else {
        match opt_str(raw, "billingType").as_deref() {
            Some("included") | Some("free") => LicenseCostPolicy::NonBillable,
            _ => LicenseCostPolicy::Billable,
        }
    };

    Ok(EntityPayload::License(License {
        product_name: part_number.replace('_', " "),
        sku: part_number,
        total_seats: opt_u32(&prepaid, "enabled").unwrap_or(0),
        assigned_seats: opt_u32(raw, "consumedUnits").unwrap_or(0),
        suspended_seats: opt_u32(&prepaid, "suspended").unwrap_or(0),
        monthly_cost_cents: raw.get("unitPriceCents").and_then(Value::as_u64),
        cost_policy,
        renewal_date: opt_rfc3339(raw, "nextLifecycleDateTime"),
    }))
}
