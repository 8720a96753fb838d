//! Normalizers for the identity-provider integrations (Microsoft Entra,
//! Duo), covering identities and directory roles.

use cw_core::entity::{EntityPayload, Identity, Role};
use serde_json::Value;

use super::{
    epoch_secs_or_epoch, opt_bool, opt_rfc3339, opt_str, opt_u32, req_str, str_array,
    DataFetchPayload, NormalizeError,
};

/// Entra object id.
pub(crate) fn entra_identity_id(raw: &Value) -> Option<String> {
    opt_str(raw, "id")
}

/// Normalizes an Entra user into an [`Identity`].
///
/// Privilege is derived from directory-role membership; MFA posture is
/// carried through as reported (absent stays `None`, which analyzers
/// treat as unreported rather than unenrolled).
pub(crate) fn entra_identity(payload: &DataFetchPayload) -> Result<EntityPayload, NormalizeError> {
    let raw = &payload.raw_data;
    let upn = req_str(raw, "userPrincipalName")?;
    let directory_roles = str_array(raw, "directoryRoles");

    Ok(EntityPayload::Identity(Identity {
        display_name: opt_str(raw, "displayName").unwrap_or_else(|| upn.clone()),
        user_principal_name: upn,
        email: opt_str(raw, "mail"),
        enabled: raw
            .get("accountEnabled")
            .and_then(Value::as_bool)
            .ok_or(NormalizeError::invalid_field("accountEnabled"))?,
        mfa_enrolled: opt_bool(raw, "isMfaRegistered"),
        last_sign_in: opt_rfc3339(raw, "lastSignInDateTime"),
        privileged: !directory_roles.is_empty(),
        groups: str_array(raw, "groups"),
        assigned_license_skus: str_array(raw, "assignedLicenses"),
    }))
}

/// Duo user id (`user_id`).
pub(crate) fn duo_identity_id(raw: &Value) -> Option<String> {
    opt_str(raw, "user_id")
}

/// Normalizes a Duo user into an [`Identity`].
pub(crate) fn duo_identity(payload: &DataFetchPayload) -> Result<EntityPayload, NormalizeError> {
    let raw = &payload.raw_data;
    let username = req_str(raw, "username")?;
    let status = req_str(raw, "status")?;
    let groups = raw
        .get("groups")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|g| g.get("name").and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(EntityPayload::Identity(Identity {
        display_name: opt_str(raw, "realname").unwrap_or_else(|| username.clone()),
        user_principal_name: username,
        email: opt_str(raw, "email"),
        // Duo "bypass" still signs in; only disabled/locked accounts
        // count as not enabled.
        enabled: !matches!(status.as_str(), "disabled" | "locked_out"),
        mfa_enrolled: opt_bool(raw, "is_enrolled"),
        last_sign_in: raw
            .get("last_login")
            .is_some()
            .then(|| epoch_secs_or_epoch(raw, "last_login")),
        privileged: opt_bool(raw, "is_admin").unwrap_or(false),
        groups,
        assigned_license_skus: Vec::new(),
    }))
}

/// Entra directory-role id.
pub(crate) fn entra_role_id(raw: &Value) -> Option<String> {
    opt_str(raw, "id")
}

/// Normalizes an Entra directory role into a [`Role`].
pub(crate) fn entra_role(payload: &DataFetchPayload) -> Result<EntityPayload, NormalizeError> {
    let raw = &payload.raw_data;
    Ok(EntityPayload::Role(Role {
        name: req_str(raw, "displayName")?,
        description: opt_str(raw, "description"),
        privileged: opt_bool(raw, "isPrivileged").unwrap_or(false),
        built_in: opt_bool(raw, "isBuiltIn").unwrap_or(true),
        member_count: opt_u32(raw, "memberCount"),
    }))
}
