//! Analysis event and finding types.
//!
//! Analyzers consume normalized-entity batches and emit one
//! [`AnalysisEvent`] per pass. Events are immutable once emitted and
//! carry everything the alert aggregator needs to reconcile without
//! reaching back into analyzer state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::AlertCategory;
use crate::bus::error::BusError;
use crate::entity::EntityType;
use crate::source::IntegrationType;

/// Severity of a finding or alert.
///
/// Ordered so that aggregation can take a max; arrival order of findings
/// never affects the merged severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

/// The analysis passes the pipeline ships.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    /// MFA enrollment posture over identities.
    MfaPosture,
    /// Check-in staleness over endpoints.
    DeviceStaleness,
    /// Unused-seat spend over licenses.
    LicenseWaste,
    /// Protection-feature coverage over firewalls.
    PolicyCoverage,
}

impl AnalysisType {
    /// The entity type this analysis consumes.
    pub fn entity_type(&self) -> EntityType {
        match self {
            AnalysisType::MfaPosture => EntityType::Identity,
            AnalysisType::DeviceStaleness => EntityType::Endpoint,
            AnalysisType::LicenseWaste => EntityType::License,
            AnalysisType::PolicyCoverage => EntityType::Firewall,
        }
    }

    /// The alert category findings from this analysis land in.
    ///
    /// More than one analysis may map into the same category; the
    /// aggregator's commutative max-severity merge handles the overlap.
    pub fn alert_category(&self) -> AlertCategory {
        match self {
            AnalysisType::MfaPosture => AlertCategory::MfaGap,
            AnalysisType::DeviceStaleness => AlertCategory::StaleDevice,
            AnalysisType::LicenseWaste => AlertCategory::LicenseWaste,
            AnalysisType::PolicyCoverage => AlertCategory::PolicyGap,
        }
    }

    /// Returns the log/metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::MfaPosture => "mfa_posture",
            AnalysisType::DeviceStaleness => "device_staleness",
            AnalysisType::LicenseWaste => "license_waste",
            AnalysisType::PolicyCoverage => "policy_coverage",
        }
    }
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One analyzer's result for one entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityFinding {
    /// External id of the entity the finding is about.
    pub entity_id: String,
    /// How bad it is.
    pub severity: Severity,
    /// Domain-specific detail payload (reasons, measured values).
    pub findings: serde_json::Value,
    /// Tenant-site scope carried over from the examined entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
}

/// The output of exactly one analyzer pass.
///
/// `examined_entities` lists every entity the pass looked at. An
/// examined entity that is absent from `findings` is the explicit "not
/// currently flagged" signal: the aggregator resolves its open alert.
/// Entities the pass never examined (e.g. unchanged records the gate
/// skipped) are simply not listed and never resolve anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEvent {
    /// Unique id of this pass.
    pub analysis_id: Uuid,
    /// Tenant the batch belonged to.
    pub tenant_id: Uuid,
    /// Data source the batch was fetched through.
    pub data_source_id: Uuid,
    /// Integration the batch came from.
    pub integration: IntegrationType,
    /// Which analysis ran.
    pub analysis_type: AnalysisType,
    /// Entity type of the batch.
    pub entity_type: EntityType,
    /// Findings, at most one per examined entity.
    pub findings: Vec<EntityFinding>,
    /// External ids of every entity the pass examined.
    pub examined_entities: Vec<String>,
    /// Emission timestamp.
    pub created_at: DateTime<Utc>,
}

impl AnalysisEvent {
    /// Serializes the event for publishing.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BusError> {
        serde_json::to_vec(self).map_err(BusError::from)
    }

    /// Deserializes an event received from the bus.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BusError> {
        serde_json::from_slice(bytes).map_err(BusError::from)
    }

    /// Validates required fields before reconciliation.
    pub fn validate(&self) -> Result<(), BusError> {
        if self.tenant_id.is_nil() {
            return Err(BusError::serialization("analysis event with nil tenant id"));
        }
        for finding in &self.findings {
            if finding.entity_id.is_empty() {
                return Err(BusError::serialization(
                    "analysis event contains a finding with an empty entity id",
                ));
            }
            if !self.examined_entities.contains(&finding.entity_id) {
                return Err(BusError::serialization(format!(
                    "finding for '{}' is not covered by examined_entities",
                    finding.entity_id
                )));
            }
        }
        Ok(())
    }

    /// Looks up the finding for one entity, if any.
    pub fn finding_for(&self, entity_id: &str) -> Option<&EntityFinding> {
        self.findings.iter().find(|f| f.entity_id == entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_with(findings: Vec<EntityFinding>, examined: Vec<&str>) -> AnalysisEvent {
        AnalysisEvent {
            analysis_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            data_source_id: Uuid::new_v4(),
            integration: IntegrationType::MicrosoftEntra,
            analysis_type: AnalysisType::MfaPosture,
            entity_type: EntityType::Identity,
            findings,
            examined_entities: examined.into_iter().map(String::from).collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn severity_ordering_supports_max_merge() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(
            [Severity::Medium, Severity::Critical, Severity::Low]
                .into_iter()
                .max(),
            Some(Severity::Critical)
        );
    }

    #[test]
    fn analysis_type_mappings() {
        assert_eq!(AnalysisType::MfaPosture.entity_type(), EntityType::Identity);
        assert_eq!(
            AnalysisType::LicenseWaste.alert_category(),
            AlertCategory::LicenseWaste
        );
        assert_eq!(AnalysisType::PolicyCoverage.as_str(), "policy_coverage");
    }

    #[test]
    fn validate_requires_examined_cover() {
        let finding = EntityFinding {
            entity_id: "u-1".to_string(),
            severity: Severity::High,
            findings: json!({"reason": "no_mfa"}),
            site_id: None,
        };

        let ok = event_with(vec![finding.clone()], vec!["u-1", "u-2"]);
        assert!(ok.validate().is_ok());
        assert!(ok.finding_for("u-1").is_some());
        assert!(ok.finding_for("u-2").is_none());

        let bad = event_with(vec![finding], vec!["u-2"]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn round_trips_through_bytes() {
        let event = event_with(vec![], vec!["u-1"]);
        let bytes = event.to_bytes().unwrap();
        let back = AnalysisEvent::from_bytes(&bytes).unwrap();
        assert_eq!(back.analysis_id, event.analysis_id);
        assert_eq!(back.examined_entities, vec!["u-1".to_string()]);
    }
}
