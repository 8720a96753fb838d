//! Subscriber workers.
//!
//! [`AnalyzerWorker`] bridges `fetched` events into one analyzer and
//! publishes its findings; [`AggregatorWorker`] bridges `analysis`
//! events into the alert aggregator. Both follow the same loop
//! discipline: a failure on one message is caught, logged with its
//! subject and error code, and never terminates the subscription loop.
//! Permanent failures (malformed payloads) are acknowledged so they are
//! not redelivered forever; transient ones are left unacked for the
//! transport to redeliver.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use cw_analyzers::{AlertAggregator, Analyzer, ReconcileError};
use cw_core::analysis::AnalysisEvent;
use cw_core::bus::{BusError, FetchedEvent, Message, MessageBus, Subject, SubjectPattern};
use cw_core::store::StoreError;

/// Errors from handling one message.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Bus interaction failed (deserialize, validate, publish, ack).
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Alert reconciliation failed.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl WorkerError {
    /// Whether redelivery could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            WorkerError::Bus(err) => err.is_transient(),
            WorkerError::Reconcile(ReconcileError::Store(err)) => err.is_transient(),
            // Contention exhausted this time; a redelivery retries with
            // fresh reads.
            WorkerError::Reconcile(ReconcileError::Contention { .. }) => true,
        }
    }

    /// Error code for structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            WorkerError::Bus(err) => err.kind(),
            WorkerError::Reconcile(ReconcileError::Store(StoreError::Conflict { .. })) => {
                "conflict"
            }
            WorkerError::Reconcile(ReconcileError::Store(_)) => "store_failed",
            WorkerError::Reconcile(ReconcileError::Contention { .. }) => "reconcile_contention",
        }
    }
}

/// Runs one analyzer against every tenant's `fetched` events for its
/// entity type.
pub struct AnalyzerWorker {
    analyzer: Arc<dyn Analyzer>,
    bus: Arc<dyn MessageBus>,
    group: String,
}

impl AnalyzerWorker {
    /// Creates a worker for an analyzer.
    pub fn new(analyzer: Arc<dyn Analyzer>, bus: Arc<dyn MessageBus>) -> Self {
        let group = format!("analyzer-{}", analyzer.analysis_type());
        Self {
            analyzer,
            bus,
            group,
        }
    }

    /// The subscription pattern this worker consumes.
    pub fn pattern(&self) -> SubjectPattern {
        SubjectPattern::all_fetched(self.analyzer.entity_type())
    }

    /// Spawns the subscription loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let pattern = self.pattern();
            let mut subscription = match self.bus.subscribe(pattern, &self.group).await {
                Ok(subscription) => subscription,
                Err(err) => {
                    error!(
                        pattern = %pattern,
                        group = %self.group,
                        error_code = err.kind(),
                        error = %err,
                        "analyzer worker failed to subscribe"
                    );
                    return;
                }
            };
            info!(pattern = %pattern, group = %self.group, "analyzer worker subscribed");

            while let Some(message) = subscription.recv().await {
                if let Err(err) = self.handle(&message).await {
                    error!(
                        subject = %message.subject,
                        error_code = err.code(),
                        error = %err,
                        "analyzer worker failed to process message"
                    );
                    if !err.is_transient() {
                        // Malformed payloads are dead on arrival; ack so
                        // the transport stops redelivering them.
                        let _ = self.bus.acknowledge(&message.subject, &message.id).await;
                    }
                }
            }
            debug!(group = %self.group, "analyzer worker subscription closed");
        })
    }

    async fn handle(&self, message: &Message) -> Result<(), WorkerError> {
        let batch = FetchedEvent::from_bytes(&message.payload)?;
        batch.validate()?;

        let analysis = self.analyzer.analyze(&batch, Utc::now());
        let subject = Subject::analysis(batch.tenant_id, batch.entity_type);
        self.bus.publish(&subject, &analysis.to_bytes()?).await?;
        self.bus.acknowledge(&message.subject, &message.id).await?;

        debug!(
            subject = %message.subject,
            findings = analysis.findings.len(),
            examined = analysis.examined_entities.len(),
            "analysis published"
        );
        Ok(())
    }
}

/// Runs the alert aggregator against every `analysis` event.
pub struct AggregatorWorker {
    aggregator: Arc<AlertAggregator>,
    bus: Arc<dyn MessageBus>,
    group: String,
}

impl AggregatorWorker {
    /// Creates the worker.
    pub fn new(aggregator: Arc<AlertAggregator>, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            aggregator,
            bus,
            group: "alert-aggregator".to_string(),
        }
    }

    /// Spawns the subscription loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let pattern = SubjectPattern::all_analysis();
            let mut subscription = match self.bus.subscribe(pattern, &self.group).await {
                Ok(subscription) => subscription,
                Err(err) => {
                    error!(
                        pattern = %pattern,
                        error_code = err.kind(),
                        error = %err,
                        "aggregator worker failed to subscribe"
                    );
                    return;
                }
            };
            info!(pattern = %pattern, group = %self.group, "aggregator worker subscribed");

            while let Some(message) = subscription.recv().await {
                if let Err(err) = self.handle(&message).await {
                    error!(
                        subject = %message.subject,
                        error_code = err.code(),
                        error = %err,
                        "aggregator worker failed to process message"
                    );
                    if !err.is_transient() {
                        let _ = self.bus.acknowledge(&message.subject, &message.id).await;
                    }
                }
            }
            debug!(group = %self.group, "aggregator worker subscription closed");
        })
    }

    async fn handle(&self, message: &Message) -> Result<(), WorkerError> {
        let event = AnalysisEvent::from_bytes(&message.payload)?;
        event.validate()?;

        let deltas = self.aggregator.reconcile(&event).await?;
        self.bus.acknowledge(&message.subject, &message.id).await?;

        if deltas.is_empty() {
            debug!(subject = %message.subject, "analysis reconciled, no alert changes");
        } else {
            info!(
                subject = %message.subject,
                deltas = deltas.len(),
                "analysis reconciled into alert changes"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_error_classification() {
        let malformed: WorkerError = BusError::serialization("garbage").into();
        assert!(!malformed.is_transient());
        assert_eq!(malformed.code(), "serialization");

        let contention: WorkerError = ReconcileError::Contention {
            key: "k".to_string(),
            attempts: 5,
        }
        .into();
        assert!(contention.is_transient());
        assert_eq!(contention.code(), "reconcile_contention");
    }
}
