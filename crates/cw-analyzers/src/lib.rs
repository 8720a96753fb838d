//! # cw-analyzers
//!
//! Analysis passes over normalized entities, and the alert aggregator
//! that reconciles their findings into composite alerts.
//!
//! Analyzers are stateless pure functions over one batch plus an
//! injected [`PolicyBaseline`]; they never mutate alert state and never
//! perform I/O, which keeps every pass deterministic and independently
//! testable. A pass that finds nothing still emits an [`AnalysisEvent`]
//! — an examined entity with no finding is how resolution propagates.
//!
//! [`AnalysisEvent`]: cw_core::analysis::AnalysisEvent

pub mod aggregator;
pub mod baseline;
pub mod license_waste;
pub mod mfa;
pub mod policy_coverage;
pub mod staleness;

pub use aggregator::{AlertAggregator, ReconcileError};
pub use baseline::PolicyBaseline;
pub use license_waste::LicenseWasteAnalyzer;
pub use mfa::MfaPostureAnalyzer;
pub use policy_coverage::PolicyCoverageAnalyzer;
pub use staleness::StalenessAnalyzer;

use chrono::{DateTime, Utc};
use cw_core::analysis::{AnalysisEvent, AnalysisType, EntityFinding};
use cw_core::bus::FetchedEvent;
use cw_core::entity::EntityType;
use uuid::Uuid;

/// One analysis pass over one entity type.
pub trait Analyzer: Send + Sync {
    /// Which analysis this is.
    fn analysis_type(&self) -> AnalysisType;

    /// The entity type this analyzer consumes.
    fn entity_type(&self) -> EntityType {
        self.analysis_type().entity_type()
    }

    /// Runs the pass over one fetched batch.
    ///
    /// `now` is passed in rather than read from a clock so that the
    /// pass stays a pure function of its inputs.
    fn analyze(&self, batch: &FetchedEvent, now: DateTime<Utc>) -> AnalysisEvent;
}

/// Assembles an analysis event from a pass over a batch.
pub(crate) fn event_for(
    batch: &FetchedEvent,
    analysis_type: AnalysisType,
    findings: Vec<EntityFinding>,
    examined_entities: Vec<String>,
    now: DateTime<Utc>,
) -> AnalysisEvent {
    AnalysisEvent {
        analysis_id: Uuid::new_v4(),
        tenant_id: batch.tenant_id,
        data_source_id: batch.data_source_id,
        integration: batch.integration,
        analysis_type,
        entity_type: analysis_type.entity_type(),
        findings,
        examined_entities,
        created_at: now,
    }
}
