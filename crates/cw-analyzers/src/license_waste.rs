//! Unused-seat spend analysis over licenses.

use chrono::{DateTime, Utc};
use cw_core::analysis::{AnalysisEvent, AnalysisType, EntityFinding, Severity};
use cw_core::bus::FetchedEvent;
use cw_core::entity::{EntityPayload, LicenseCostPolicy};
use serde_json::json;
use tracing::debug;

use crate::{event_for, Analyzer, PolicyBaseline};

/// Flags billable SKUs with a meaningful number of unassigned seats.
///
/// Trial and non-billable SKUs are examined but never flagged — unused
/// seats there cost nothing. Severity escalates to High when the wasted
/// monthly spend crosses the baseline threshold.
#[derive(Debug)]
pub struct LicenseWasteAnalyzer {
    baseline: PolicyBaseline,
}

impl LicenseWasteAnalyzer {
    /// Creates the analyzer with a baseline.
    pub fn new(baseline: PolicyBaseline) -> Self {
        Self { baseline }
    }
}

impl Analyzer for LicenseWasteAnalyzer {
    fn analysis_type(&self) -> AnalysisType {
        AnalysisType::LicenseWaste
    }

    fn analyze(&self, batch: &FetchedEvent, now: DateTime<Utc>) -> AnalysisEvent {
        let mut findings = Vec::new();
        let mut examined = Vec::new();

        for record in &batch.entities {
            let EntityPayload::License(license) = &record.normalized else {
                continue;
            };
            examined.push(record.external_id.clone());

            if license.cost_policy != LicenseCostPolicy::Billable {
                continue;
            }

            let unassigned = license.unassigned_seats();
            let ratio = license.waste_ratio();
            let over_seats = unassigned >= self.baseline.license_waste_min_seats;
            let over_ratio = ratio >= self.baseline.license_waste_min_ratio;
            if unassigned == 0 || (!over_seats && !over_ratio) {
                continue;
            }

            let wasted_cents = license.wasted_monthly_cost_cents();
            let severity = match wasted_cents {
                Some(cents) if cents >= self.baseline.license_waste_high_monthly_cents => {
                    Severity::High
                }
                Some(_) => Severity::Medium,
                // No price data: flag it, but keep it low until someone
                // attaches cost.
                None => Severity::Low,
            };

            findings.push(EntityFinding {
                entity_id: record.external_id.clone(),
                severity,
                findings: json!({
                    "reason": "unassigned_seats",
                    "sku": license.sku,
                    "product_name": license.product_name,
                    "total_seats": license.total_seats,
                    "assigned_seats": license.assigned_seats,
                    "unassigned_seats": unassigned,
                    "waste_ratio": ratio,
                    "wasted_monthly_cost_cents": wasted_cents,
                }),
                site_id: record.site_id.clone(),
            });
        }

        debug!(
            tenant_id = %batch.tenant_id,
            examined = examined.len(),
            flagged = findings.len(),
            "license waste pass complete"
        );
        event_for(batch, AnalysisType::LicenseWaste, findings, examined, now)
    }
}
