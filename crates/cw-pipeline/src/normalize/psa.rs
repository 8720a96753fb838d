//! Normalizers for the PSA integration (ConnectWise PSA).

use cw_core::entity::{Company, CompanyStatus, EntityPayload};
use serde_json::Value;

use super::{opt_str, req_str, DataFetchPayload, NormalizeError};

/// ConnectWise company id (numeric `id`).
pub(crate) fn connectwise_company_id(raw: &Value) -> Option<String> {
    raw.get("id").and_then(Value::as_u64).map(|n| n.to_string())
}

/// Normalizes a ConnectWise company record into a [`Company`].
pub(crate) fn connectwise_company(
    payload: &DataFetchPayload,
) -> Result<EntityPayload, NormalizeError> {
    let raw = &payload.raw_data;
    let status_name = raw
        .get("status")
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("Active");
    let status = if status_name.eq_ignore_ascii_case("active") {
        CompanyStatus::Active
    } else {
        CompanyStatus::Inactive
    };

    Ok(EntityPayload::Company(Company {
        name: req_str(raw, "name")?,
        domain: opt_str(raw, "website"),
        status,
        address: opt_str(raw, "addressLine1"),
        city: opt_str(raw, "city"),
        country: opt_str(raw, "country"),
        phone: opt_str(raw, "phoneNumber"),
        account_number: opt_str(raw, "identifier"),
    }))
}
