//! Normalizer registry and per-entity-type processor.

use std::collections::HashMap;
use std::sync::Arc;

use cw_core::entity::{EntityType, NormalizedEntity, NormalizedRecord};
use cw_core::source::IntegrationType;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::{endpoint_security, identity, network, productivity, psa, rmm};
use super::{DataFetchPayload, NormalizeError};

/// Extracts the provider-native stable id from a raw payload.
pub type IdExtractor = fn(&Value) -> Option<String>;

/// Normalizes one gated payload into a canonical entity.
pub type NormalizerFn = fn(&DataFetchPayload) -> Result<cw_core::entity::EntityPayload, NormalizeError>;

/// The two pure functions registered per (entity type, integration).
#[derive(Clone, Copy)]
pub struct NormalizerEntry {
    /// Id lookup used by the gate before normalization runs.
    pub external_id: IdExtractor,
    /// The normalizer itself.
    pub normalize: NormalizerFn,
}

/// Closed mapping from (entity type, integration) to normalizer entry.
///
/// Registered once at startup, looked up at call time. Adding provider
/// support is a registration, not a subclass.
#[derive(Default)]
pub struct NormalizerRegistry {
    entries: HashMap<(EntityType, IntegrationType), NormalizerEntry>,
}

impl NormalizerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in normalizer registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(
            EntityType::Endpoint,
            IntegrationType::DattoRmm,
            NormalizerEntry {
                external_id: rmm::datto_endpoint_id,
                normalize: rmm::datto_endpoint,
            },
        );
        registry.register(
            EntityType::Endpoint,
            IntegrationType::NinjaOne,
            NormalizerEntry {
                external_id: rmm::ninja_endpoint_id,
                normalize: rmm::ninja_endpoint,
            },
        );
        registry.register(
            EntityType::Endpoint,
            IntegrationType::SentinelOne,
            NormalizerEntry {
                external_id: endpoint_security::sentinelone_endpoint_id,
                normalize: endpoint_security::sentinelone_endpoint,
            },
        );
        registry.register(
            EntityType::Company,
            IntegrationType::ConnectwisePsa,
            NormalizerEntry {
                external_id: psa::connectwise_company_id,
                normalize: psa::connectwise_company,
            },
        );
        registry.register(
            EntityType::Identity,
            IntegrationType::MicrosoftEntra,
            NormalizerEntry {
                external_id: identity::entra_identity_id,
                normalize: identity::entra_identity,
            },
        );
        registry.register(
            EntityType::Identity,
            IntegrationType::Duo,
            NormalizerEntry {
                external_id: identity::duo_identity_id,
                normalize: identity::duo_identity,
            },
        );
        registry.register(
            EntityType::License,
            IntegrationType::Microsoft365,
            NormalizerEntry {
                external_id: productivity::m365_license_id,
                normalize: productivity::m365_license,
            },
        );
        registry.register(
            EntityType::Firewall,
            IntegrationType::Meraki,
            NormalizerEntry {
                external_id: network::meraki_firewall_id,
                normalize: network::meraki_firewall,
            },
        );
        registry.register(
            EntityType::Role,
            IntegrationType::MicrosoftEntra,
            NormalizerEntry {
                external_id: identity::entra_role_id,
                normalize: identity::entra_role,
            },
        );

        registry
    }

    /// Registers an entry, replacing any previous one for the pair.
    pub fn register(
        &mut self,
        entity_type: EntityType,
        integration: IntegrationType,
        entry: NormalizerEntry,
    ) {
        debug!(entity_type = %entity_type, integration = %integration, "registered normalizer");
        self.entries.insert((entity_type, integration), entry);
    }

    /// Looks up the entry for a pair.
    pub fn get(
        &self,
        entity_type: EntityType,
        integration: IntegrationType,
    ) -> Option<NormalizerEntry> {
        self.entries.get(&(entity_type, integration)).copied()
    }

    /// Pairs with a registered normalizer.
    pub fn registered_pairs(&self) -> Vec<(EntityType, IntegrationType)> {
        self.entries.keys().copied().collect()
    }
}

impl std::fmt::Debug for NormalizerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizerRegistry")
            .field("pairs", &self.registered_pairs())
            .finish()
    }
}

/// Normalizes gated payloads for one entity type.
///
/// One processor per entity type; integration dispatch goes through the
/// registry. An integration with no registered normalizer is non-fatal:
/// the batch is skipped with a `NORMALIZER_NOT_FOUND` log and other
/// entity types' processors continue untouched.
pub struct Processor {
    entity_type: EntityType,
    registry: Arc<NormalizerRegistry>,
}

impl Processor {
    /// Creates a processor for one entity type over a registry.
    pub fn new(entity_type: EntityType, registry: Arc<NormalizerRegistry>) -> Self {
        Self {
            entity_type,
            registry,
        }
    }

    /// The entity type this processor produces.
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Normalizes a batch of gated payloads from one integration.
    ///
    /// Per-record failures are logged and skipped; the method never
    /// panics and never propagates an error for the batch.
    pub fn normalize(
        &self,
        integration: IntegrationType,
        payloads: &[DataFetchPayload],
    ) -> Vec<NormalizedRecord> {
        let Some(entry) = self.registry.get(self.entity_type, integration) else {
            error!(
                error_code = "NORMALIZER_NOT_FOUND",
                entity_type = %self.entity_type,
                integration = %integration,
                "no normalizer registered for this integration"
            );
            return Vec::new();
        };

        let mut records = Vec::with_capacity(payloads.len());
        for payload in payloads {
            match (entry.normalize)(payload) {
                Ok(normalized) => records.push(NormalizedEntity {
                    external_id: payload.external_id.clone(),
                    raw: payload.raw_data.clone(),
                    hash: payload.data_hash.clone(),
                    site_id: payload.site_id.clone(),
                    normalized,
                }),
                Err(err) => {
                    warn!(
                        error_code = "NORMALIZE_FAILED",
                        entity_type = %self.entity_type,
                        integration = %integration,
                        external_id = %payload.external_id,
                        error = %err,
                        "dropping record that failed normalization"
                    );
                }
            }
        }
        records
    }
}
