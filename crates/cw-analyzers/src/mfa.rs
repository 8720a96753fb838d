//! MFA posture analysis over identities.

use chrono::{DateTime, Utc};
use cw_core::analysis::{AnalysisEvent, AnalysisType, EntityFinding, Severity};
use cw_core::bus::FetchedEvent;
use cw_core::entity::EntityPayload;
use serde_json::json;
use tracing::debug;

use crate::{event_for, Analyzer};

/// Flags enabled accounts without confirmed MFA enrollment.
///
/// Privileged accounts without MFA are High; standard accounts Medium.
/// An account whose provider did not report posture at all is Low — it
/// needs review, not an incident. Disabled accounts are examined but
/// never flagged.
#[derive(Debug, Default)]
pub struct MfaPostureAnalyzer;

impl MfaPostureAnalyzer {
    /// Creates the analyzer.
    pub fn new() -> Self {
        Self
    }
}

impl Analyzer for MfaPostureAnalyzer {
    fn analysis_type(&self) -> AnalysisType {
        AnalysisType::MfaPosture
    }

    fn analyze(&self, batch: &FetchedEvent, now: DateTime<Utc>) -> AnalysisEvent {
        let mut findings = Vec::new();
        let mut examined = Vec::new();

        for record in &batch.entities {
            let EntityPayload::Identity(identity) = &record.normalized else {
                continue;
            };
            examined.push(record.external_id.clone());

            if !identity.enabled {
                continue;
            }

            let (severity, reason) = match identity.mfa_enrolled {
                Some(true) => continue,
                Some(false) if identity.privileged => (Severity::High, "not_enrolled"),
                Some(false) => (Severity::Medium, "not_enrolled"),
                None => (Severity::Low, "posture_unreported"),
            };

            findings.push(EntityFinding {
                entity_id: record.external_id.clone(),
                severity,
                findings: json!({
                    "reason": reason,
                    "user_principal_name": identity.user_principal_name,
                    "privileged": identity.privileged,
                }),
                site_id: record.site_id.clone(),
            });
        }

        debug!(
            tenant_id = %batch.tenant_id,
            examined = examined.len(),
            flagged = findings.len(),
            "mfa posture pass complete"
        );
        event_for(batch, AnalysisType::MfaPosture, findings, examined, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_core::entity::{EntityType, Identity, NormalizedEntity};
    use cw_core::source::IntegrationType;
    use serde_json::json;
    use uuid::Uuid;

    fn identity_record(id: &str, enabled: bool, mfa: Option<bool>, privileged: bool) -> NormalizedEntity<EntityPayload> {
        NormalizedEntity {
            external_id: id.to_string(),
            raw: json!({"id": id}),
            hash: format!("hash-{id}"),
            site_id: None,
            normalized: EntityPayload::Identity(Identity {
                user_principal_name: format!("{id}@example.com"),
                display_name: id.to_string(),
                email: None,
                enabled,
                mfa_enrolled: mfa,
                last_sign_in: None,
                privileged,
                groups: Vec::new(),
                assigned_license_skus: Vec::new(),
            }),
        }
    }

    fn batch(entities: Vec<NormalizedEntity<EntityPayload>>) -> FetchedEvent {
        FetchedEvent::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            IntegrationType::MicrosoftEntra,
            EntityType::Identity,
            entities,
        )
    }

    #[test]
    fn flags_unenrolled_accounts_by_privilege() {
        let event = MfaPostureAnalyzer::new().analyze(
            &batch(vec![
                identity_record("admin", true, Some(false), true),
                identity_record("user", true, Some(false), false),
                identity_record("enrolled", true, Some(true), false),
            ]),
            Utc::now(),
        );

        assert_eq!(event.examined_entities.len(), 3);
        assert_eq!(event.findings.len(), 2);
        assert_eq!(event.finding_for("admin").unwrap().severity, Severity::High);
        assert_eq!(event.finding_for("user").unwrap().severity, Severity::Medium);
        assert!(event.finding_for("enrolled").is_none());
        event.validate().unwrap();
    }

    #[test]
    fn unreported_posture_is_low() {
        let event = MfaPostureAnalyzer::new().analyze(
            &batch(vec![identity_record("mystery", true, None, false)]),
            Utc::now(),
        );
        assert_eq!(event.finding_for("mystery").unwrap().severity, Severity::Low);
        assert_eq!(
            event.finding_for("mystery").unwrap().findings["reason"],
            "posture_unreported"
        );
    }

    #[test]
    fn disabled_accounts_are_examined_but_clean() {
        let event = MfaPostureAnalyzer::new().analyze(
            &batch(vec![identity_record("leaver", false, Some(false), false)]),
            Utc::now(),
        );
        assert_eq!(event.examined_entities, vec!["leaver".to_string()]);
        assert!(event.findings.is_empty());
    }

    #[test]
    fn empty_batch_still_emits_event() {
        let event = MfaPostureAnalyzer::new().analyze(&batch(vec![]), Utc::now());
        assert!(event.findings.is_empty());
        assert!(event.examined_entities.is_empty());
        assert_eq!(event.analysis_type, AnalysisType::MfaPosture);
    }
}
