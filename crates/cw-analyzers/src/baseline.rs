//! Organizational policy baseline.
//!
//! Analyzers are pure functions over a batch plus this baseline; nothing
//! is fetched from inside an analyzer. The baseline is supplied by the
//! host at construction, typically from tenant policy settings.

use chrono::Duration;

/// Thresholds and requirements the analyzers judge against.
#[derive(Debug, Clone)]
pub struct PolicyBaseline {
    /// Check-in age at which an endpoint is moderately stale.
    pub stale_medium_after: Duration,
    /// Check-in age at which an endpoint is severely stale.
    pub stale_high_after: Duration,

    /// Minimum unassigned billable seats before a license is flagged.
    pub license_waste_min_seats: u32,
    /// Minimum unassigned ratio before a license is flagged.
    pub license_waste_min_ratio: f64,
    /// Wasted monthly spend (cents) that escalates a license finding to
    /// high severity.
    pub license_waste_high_monthly_cents: u64,

    /// Whether intrusion prevention is required on firewalls.
    pub require_ips: bool,
    /// Whether content filtering is required on firewalls.
    pub require_content_filtering: bool,
    /// Whether firewalls must run current firmware.
    pub require_current_firmware: bool,
}

impl Default for PolicyBaseline {
    fn default() -> Self {
        Self {
            stale_medium_after: Duration::days(14),
            stale_high_after: Duration::days(30),
            license_waste_min_seats: 5,
            license_waste_min_ratio: 0.25,
            license_waste_high_monthly_cents: 50_000,
            require_ips: true,
            require_content_filtering: true,
            require_current_firmware: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_are_ordered() {
        let baseline = PolicyBaseline::default();
        assert!(baseline.stale_high_after > baseline.stale_medium_after);
        assert!(baseline.license_waste_min_ratio > 0.0);
    }
}
