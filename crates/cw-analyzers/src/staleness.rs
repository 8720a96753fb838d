//! Check-in staleness analysis over endpoints.

use chrono::{DateTime, Utc};
use cw_core::analysis::{AnalysisEvent, AnalysisType, EntityFinding, Severity};
use cw_core::bus::FetchedEvent;
use cw_core::entity::EntityPayload;
use serde_json::json;
use tracing::debug;

use crate::{event_for, Analyzer, PolicyBaseline};

/// Flags endpoints that have stopped checking in.
///
/// Tiers come from the baseline: past `stale_medium_after` is Medium,
/// past `stale_high_after` is High. An endpoint that has never checked
/// in at all (epoch-zero default) is High — an agent that never
/// reported is worse than one that went quiet.
#[derive(Debug)]
pub struct StalenessAnalyzer {
    baseline: PolicyBaseline,
}

impl StalenessAnalyzer {
    /// Creates the analyzer with a baseline.
    pub fn new(baseline: PolicyBaseline) -> Self {
        Self { baseline }
    }
}

impl Analyzer for StalenessAnalyzer {
    fn analysis_type(&self) -> AnalysisType {
        AnalysisType::DeviceStaleness
    }

    fn analyze(&self, batch: &FetchedEvent, now: DateTime<Utc>) -> AnalysisEvent {
        let mut findings = Vec::new();
        let mut examined = Vec::new();

        for record in &batch.entities {
            let EntityPayload::Endpoint(endpoint) = &record.normalized else {
                continue;
            };
            examined.push(record.external_id.clone());

            let age = endpoint.check_in_age(now);
            let (severity, reason) = if !endpoint.has_checked_in() {
                (Severity::High, "never_checked_in")
            } else if age >= self.baseline.stale_high_after {
                (Severity::High, "stale")
            } else if age >= self.baseline.stale_medium_after {
                (Severity::Medium, "stale")
            } else {
                continue;
            };

            findings.push(EntityFinding {
                entity_id: record.external_id.clone(),
                severity,
                findings: json!({
                    "reason": reason,
                    "hostname": endpoint.hostname,
                    "last_check_in": endpoint.last_check_in,
                    "age_days": age.num_days(),
                }),
                site_id: record.site_id.clone(),
            });
        }

        debug!(
            tenant_id = %batch.tenant_id,
            examined = examined.len(),
            flagged = findings.len(),
            "staleness pass complete"
        );
        event_for(batch, AnalysisType::DeviceStaleness, findings, examined, now)
    }
}
