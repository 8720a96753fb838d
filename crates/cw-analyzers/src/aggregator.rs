//! Alert aggregation.
//!
//! The aggregator consumes analysis events across all analyzers and
//! reconciles each one into composite alert state, one state machine per
//! (tenant, entity, category):
//!
//! - none → open on the first finding
//! - open → open on further findings (max-severity merge)
//! - open → resolved when the entity is examined and no longer flagged
//! - resolved → open as a fresh episode when a finding reappears
//!
//! Two analyzer passes may reconcile the same key concurrently, so every
//! write goes through the store's compare-and-swap and the loser retries
//! from a fresh read. Contention below the attempt bound is expected and
//! silent; exhausting the bound surfaces as an error.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, instrument, trace};

use cw_core::alert::{Alert, AlertDelta, AlertKey, ContributingFinding, VersionedAlert};
use cw_core::analysis::{AnalysisEvent, EntityFinding};
use cw_core::store::{AlertStore, StoreError};

/// Default bound on CAS retries per alert key.
pub const DEFAULT_MAX_RECONCILE_ATTEMPTS: u32 = 5;

/// Errors from alert reconciliation.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The alert store failed in a way retrying cannot fix.
    #[error("alert store error: {0}")]
    Store(#[from] StoreError),

    /// CAS retries were exhausted for one key.
    #[error("reconcile contention on {key} exhausted after {attempts} attempts")]
    Contention {
        /// Render of the contended key.
        key: String,
        /// How many attempts were made.
        attempts: u32,
    },
}

/// Reconciles analysis events into composite alerts.
pub struct AlertAggregator {
    alerts: Arc<dyn AlertStore>,
    max_attempts: u32,
}

impl AlertAggregator {
    /// Creates an aggregator over an alert store.
    pub fn new(alerts: Arc<dyn AlertStore>) -> Self {
        Self {
            alerts,
            max_attempts: DEFAULT_MAX_RECONCILE_ATTEMPTS,
        }
    }

    /// Overrides the CAS retry bound.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Reconciles one analysis event, returning the state changes made.
    ///
    /// Findings upsert alerts; examined-but-clean entities resolve any
    /// open alert in the event's category. Entities the pass never
    /// examined are untouched.
    #[instrument(skip_all, fields(
        tenant_id = %event.tenant_id,
        analysis_type = %event.analysis_type,
        findings = event.findings.len(),
        examined = event.examined_entities.len(),
    ))]
    pub async fn reconcile(&self, event: &AnalysisEvent) -> Result<Vec<AlertDelta>, ReconcileError> {
        let category = event.analysis_type.alert_category();
        let mut deltas = Vec::new();

        for finding in &event.findings {
            let key = AlertKey::new(event.tenant_id, finding.entity_id.clone(), category);
            if let Some(delta) = self.apply_finding(&key, event, finding).await? {
                deltas.push(delta);
            }
        }

        for entity_id in &event.examined_entities {
            if event.finding_for(entity_id).is_some() {
                continue;
            }
            let key = AlertKey::new(event.tenant_id, entity_id.clone(), category);
            if let Some(delta) = self.apply_resolution(&key).await? {
                deltas.push(delta);
            }
        }

        debug!(deltas = deltas.len(), "reconcile complete");
        Ok(deltas)
    }

    /// Applies one finding to its key, retrying CAS losses.
    async fn apply_finding(
        &self,
        key: &AlertKey,
        event: &AnalysisEvent,
        finding: &EntityFinding,
    ) -> Result<Option<AlertDelta>, ReconcileError> {
        for attempt in 1..=self.max_attempts {
            let contributing = ContributingFinding {
                analysis_id: event.analysis_id,
                analysis_type: event.analysis_type,
                severity: finding.severity,
                detail: finding.findings.clone(),
                recorded_at: Utc::now(),
            };

            match self.alerts.get(key).await? {
                None => {
                    let alert = Alert::open(key, contributing, finding.site_id.clone());
                    match self.alerts.insert_new(key, VersionedAlert::new(alert)).await {
                        Ok(()) => {
                            return Ok(Some(AlertDelta::Opened {
                                key: key.clone(),
                                severity: finding.severity,
                            }))
                        }
                        Err(StoreError::Conflict { .. }) => {
                            trace!(key = %key, attempt, "insert lost the race, re-reading");
                            continue;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                Some(mut versioned) => {
                    let expected = versioned.version;
                    let delta = if versioned.current.is_open() {
                        // Redelivered pass: already recorded, nothing to do.
                        if versioned
                            .current
                            .contributing
                            .iter()
                            .any(|c| c.analysis_id == event.analysis_id)
                        {
                            return Ok(None);
                        }
                        let before = versioned.current.severity;
                        versioned.current.absorb(contributing);
                        if versioned.current.severity > before {
                            AlertDelta::SeverityRaised {
                                key: key.clone(),
                                from: before,
                                to: versioned.current.severity,
                            }
                        } else {
                            AlertDelta::FindingAppended { key: key.clone() }
                        }
                    } else {
                        let alert = Alert::open(key, contributing, finding.site_id.clone());
                        let severity = alert.severity;
                        versioned.reopen(alert);
                        AlertDelta::Reopened {
                            key: key.clone(),
                            severity,
                        }
                    };

                    match self.alerts.compare_and_put(key, expected, versioned).await {
                        Ok(()) => return Ok(Some(delta)),
                        Err(StoreError::Conflict { .. }) => {
                            trace!(key = %key, attempt, "cas lost the race, re-reading");
                            continue;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }

        Err(ReconcileError::Contention {
            key: key.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Resolves the alert for a key the pass examined without flagging.
    async fn apply_resolution(&self, key: &AlertKey) -> Result<Option<AlertDelta>, ReconcileError> {
        for attempt in 1..=self.max_attempts {
            match self.alerts.get(key).await? {
                None => return Ok(None),
                Some(versioned) if !versioned.current.is_open() => return Ok(None),
                Some(mut versioned) => {
                    let expected = versioned.version;
                    versioned.current.resolve();
                    match self.alerts.compare_and_put(key, expected, versioned).await {
                        Ok(()) => return Ok(Some(AlertDelta::Resolved { key: key.clone() })),
                        Err(StoreError::Conflict { .. }) => {
                            trace!(key = %key, attempt, "cas lost the race, re-reading");
                            continue;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }

        Err(ReconcileError::Contention {
            key: key.to_string(),
            attempts: self.max_attempts,
        })
    }
}
