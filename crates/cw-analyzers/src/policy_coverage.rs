//! Protection-coverage analysis over firewalls.

use chrono::{DateTime, Utc};
use cw_core::analysis::{AnalysisEvent, AnalysisType, EntityFinding, Severity};
use cw_core::bus::FetchedEvent;
use cw_core::entity::EntityPayload;
use serde_json::json;
use tracing::debug;

use crate::{event_for, Analyzer, PolicyBaseline};

/// Flags firewalls missing protections the baseline requires.
///
/// Disabled intrusion prevention is High; missing content filtering or
/// stale firmware are Medium. A protection the provider did not report
/// on is skipped rather than assumed missing — absence of data is a
/// data-quality issue, not a policy gap.
#[derive(Debug)]
pub struct PolicyCoverageAnalyzer {
    baseline: PolicyBaseline,
}

impl PolicyCoverageAnalyzer {
    /// Creates the analyzer with a baseline.
    pub fn new(baseline: PolicyBaseline) -> Self {
        Self { baseline }
    }
}

impl Analyzer for PolicyCoverageAnalyzer {
    fn analysis_type(&self) -> AnalysisType {
        AnalysisType::PolicyCoverage
    }

    fn analyze(&self, batch: &FetchedEvent, now: DateTime<Utc>) -> AnalysisEvent {
        let mut findings = Vec::new();
        let mut examined = Vec::new();

        for record in &batch.entities {
            let EntityPayload::Firewall(firewall) = &record.normalized else {
                continue;
            };
            examined.push(record.external_id.clone());

            let mut gaps: Vec<(&str, Severity)> = Vec::new();
            if self.baseline.require_ips && firewall.ips_enabled == Some(false) {
                gaps.push(("intrusion_prevention_disabled", Severity::High));
            }
            if self.baseline.require_content_filtering
                && firewall.content_filtering_enabled == Some(false)
            {
                gaps.push(("content_filtering_disabled", Severity::Medium));
            }
            if self.baseline.require_current_firmware && firewall.firmware_current == Some(false) {
                gaps.push(("firmware_outdated", Severity::Medium));
            }

            let Some(severity) = gaps.iter().map(|(_, s)| *s).max() else {
                continue;
            };

            findings.push(EntityFinding {
                entity_id: record.external_id.clone(),
                severity,
                findings: json!({
                    "reason": "policy_gaps",
                    "name": firewall.name,
                    "gaps": gaps.iter().map(|(g, _)| *g).collect::<Vec<_>>(),
                    "firmware_version": firewall.firmware_version,
                }),
                site_id: record.site_id.clone(),
            });
        }

        debug!(
            tenant_id = %batch.tenant_id,
            examined = examined.len(),
            flagged = findings.len(),
            "policy coverage pass complete"
        );
        event_for(batch, AnalysisType::PolicyCoverage, findings, examined, now)
    }
}
