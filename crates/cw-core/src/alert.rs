//! Composite alert model.
//!
//! An alert aggregates the findings of one or more analyzer passes for
//! one entity in one category. Alerts are stateful — they open, absorb
//! further findings, resolve, and may reopen as a new episode — while
//! the findings feeding them are immutable events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{AnalysisType, Severity};

/// Category an alert is keyed under.
///
/// Categories are coarser than analysis types: several analyzers may
/// feed the same category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    /// Account missing MFA enrollment.
    MfaGap,
    /// Endpoint not checking in.
    StaleDevice,
    /// Paid seats going unused.
    LicenseWaste,
    /// Required protection disabled or outdated.
    PolicyGap,
}

impl AlertCategory {
    /// Returns the database-compatible string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AlertCategory::MfaGap => "mfa_gap",
            AlertCategory::StaleDevice => "stale_device",
            AlertCategory::LicenseWaste => "license_waste",
            AlertCategory::PolicyGap => "policy_gap",
        }
    }
}

impl std::fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// The key an alert is reconciled under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AlertKey {
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// External id of the entity the alert is about.
    pub entity_id: String,
    /// Alert category.
    pub category: AlertCategory,
}

impl AlertKey {
    /// Builds a key.
    pub fn new(tenant_id: Uuid, entity_id: impl Into<String>, category: AlertCategory) -> Self {
        Self {
            tenant_id,
            entity_id: entity_id.into(),
            category,
        }
    }
}

impl std::fmt::Display for AlertKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.tenant_id, self.entity_id, self.category)
    }
}

/// Whether an alert is live or closed out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Resolved,
}

/// One finding's contribution to an alert, kept for audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContributingFinding {
    /// The analyzer pass that produced it.
    pub analysis_id: Uuid,
    /// Which analysis it was.
    pub analysis_type: AnalysisType,
    /// Severity at the time of the finding.
    pub severity: Severity,
    /// Domain detail payload.
    pub detail: serde_json::Value,
    /// When the aggregator recorded it.
    pub recorded_at: DateTime<Utc>,
}

/// A composite alert for one (tenant, entity, category).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique id of this episode.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// External id of the affected entity.
    pub entity_id: String,
    /// Category the alert is keyed under.
    pub category: AlertCategory,
    /// Current severity: the max of all contributing findings.
    pub severity: Severity,
    /// Lifecycle status.
    pub status: AlertStatus,
    /// Findings that fed this episode.
    pub contributing: Vec<ContributingFinding>,
    /// Tenant-site scope, when the underlying entity carried one.
    pub site_id: Option<String>,
    /// When this episode opened.
    pub created_at: DateTime<Utc>,
    /// Last reconcile touch.
    pub updated_at: DateTime<Utc>,
    /// When this episode resolved, if it has.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Opens a new alert episode from its first finding.
    pub fn open(key: &AlertKey, finding: ContributingFinding, site_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: key.tenant_id,
            entity_id: key.entity_id.clone(),
            category: key.category,
            severity: finding.severity,
            status: AlertStatus::Open,
            contributing: vec![finding],
            site_id,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    /// Merges a further finding into an open episode.
    ///
    /// Severity becomes the max of current and new, so merging is
    /// commutative across racing analyzer passes. A finding from an
    /// analysis pass already recorded is ignored (redelivery).
    pub fn absorb(&mut self, finding: ContributingFinding) {
        if self
            .contributing
            .iter()
            .any(|c| c.analysis_id == finding.analysis_id)
        {
            return;
        }
        self.severity = self.severity.max(finding.severity);
        self.contributing.push(finding);
        self.updated_at = Utc::now();
    }

    /// Resolves the episode.
    pub fn resolve(&mut self) {
        let now = Utc::now();
        self.status = AlertStatus::Resolved;
        self.resolved_at = Some(now);
        self.updated_at = now;
    }

    /// Returns whether the episode is open.
    pub fn is_open(&self) -> bool {
        self.status == AlertStatus::Open
    }
}

/// Stored alert state for one key: the current episode plus history.
///
/// `version` supports compare-and-swap upserts; two analyzer passes may
/// reconcile the same key concurrently and the loser retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedAlert {
    /// CAS version, incremented on every successful write.
    pub version: u64,
    /// The live episode.
    pub current: Alert,
    /// Resolved episodes, oldest first.
    pub previous_episodes: Vec<Alert>,
}

impl VersionedAlert {
    /// Wraps a freshly opened alert at version 1.
    pub fn new(alert: Alert) -> Self {
        Self {
            version: 1,
            current: alert,
            previous_episodes: Vec::new(),
        }
    }

    /// Starts a new episode, archiving the resolved current one.
    pub fn reopen(&mut self, alert: Alert) {
        let previous = std::mem::replace(&mut self.current, alert);
        self.previous_episodes.push(previous);
    }
}

/// What a reconcile pass did to one alert key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "delta", rename_all = "snake_case")]
pub enum AlertDelta {
    /// First finding for the key opened an alert.
    Opened {
        key: AlertKey,
        severity: Severity,
    },
    /// A further finding raised the severity.
    SeverityRaised {
        key: AlertKey,
        from: Severity,
        to: Severity,
    },
    /// A further finding was appended without changing severity.
    FindingAppended {
        key: AlertKey,
    },
    /// The entity was examined and no longer flagged.
    Resolved {
        key: AlertKey,
    },
    /// A finding reappeared on a resolved key; a new episode opened.
    Reopened {
        key: AlertKey,
        severity: Severity,
    },
}

impl AlertDelta {
    /// The key the delta applies to.
    pub fn key(&self) -> &AlertKey {
        match self {
            AlertDelta::Opened { key, .. }
            | AlertDelta::SeverityRaised { key, .. }
            | AlertDelta::FindingAppended { key }
            | AlertDelta::Resolved { key }
            | AlertDelta::Reopened { key, .. } => key,
        }
    }
}
