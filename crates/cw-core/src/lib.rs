//! # cw-core
//!
//! Core types and seams for the Crosswatch ingestion pipeline: the
//! canonical entity model, integration/data-source reference types, the
//! content-hash gate, the message bus abstraction, the persistence
//! interfaces, and the analysis/alert models.

pub mod alert;
pub mod analysis;
pub mod bus;
pub mod entity;
pub mod hash;
pub mod source;
pub mod store;

pub use alert::{
    Alert, AlertCategory, AlertDelta, AlertKey, AlertStatus, ContributingFinding, VersionedAlert,
};
pub use analysis::{AnalysisEvent, AnalysisType, EntityFinding, Severity};
pub use bus::{
    BusError, BusHealth, FetchedEvent, InMemoryBus, Message, MessageBus, MessageId, Stage,
    Subject, SubjectPattern, Subscription,
};
pub use entity::{
    Company, CompanyStatus, Endpoint, EndpointStatus, EntityPayload, EntityType, Firewall,
    Identity, License, LicenseCostPolicy, NormalizedEntity, NormalizedRecord, Role,
};
pub use hash::{content_hash, should_process, HashError};
pub use source::{
    DataSource, DataSourceStatus, Integration, IntegrationCategory, IntegrationType,
    CREDENTIALS_NEVER_EXPIRE,
};
pub use store::{
    AlertStore, EntityStore, MemoryAlertStore, MemoryEntityStore, StoreError, StoreResult,
};
