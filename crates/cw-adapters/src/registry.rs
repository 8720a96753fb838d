//! Adapter registry.
//!
//! Adapters are constructed by the host application (with their HTTP
//! clients and credentials) and registered here; the fetch runner looks
//! them up by integration type at run time. The registry is explicitly
//! dependency-injected — there is no process-global adapter or shared
//! connection singleton, so each pipeline run stays testable in
//! isolation.

use std::collections::HashMap;
use std::sync::Arc;

use cw_core::source::IntegrationType;
use tracing::debug;

use crate::traits::Adapter;

/// Lookup table from integration type to its adapter.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<IntegrationType, Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter, replacing any previous one for the same
    /// integration.
    pub fn register(&mut self, adapter: Arc<dyn Adapter>) {
        let integration = adapter.integration();
        debug!(integration = %integration, "registered adapter");
        self.adapters.insert(integration, adapter);
    }

    /// Looks up the adapter for an integration.
    pub fn get(&self, integration: IntegrationType) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(&integration).cloned()
    }

    /// Integrations with a registered adapter.
    pub fn registered_integrations(&self) -> Vec<IntegrationType> {
        self.adapters.keys().copied().collect()
    }

    /// Number of registered adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("integrations", &self.registered_integrations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAdapter;
    use cw_core::entity::EntityType;

    #[test]
    fn register_and_lookup() {
        let mut registry = AdapterRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(MockAdapter::new(
            IntegrationType::DattoRmm,
            vec![EntityType::Endpoint],
        )));

        assert_eq!(registry.len(), 1);
        assert!(registry.get(IntegrationType::DattoRmm).is_some());
        assert!(registry.get(IntegrationType::Meraki).is_none());
    }

    #[test]
    fn re_registration_replaces() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(MockAdapter::new(
            IntegrationType::Duo,
            vec![EntityType::Identity],
        )));
        registry.register(Arc::new(MockAdapter::new(
            IntegrationType::Duo,
            vec![EntityType::Identity, EntityType::Role],
        )));

        assert_eq!(registry.len(), 1);
        let adapter = registry.get(IntegrationType::Duo).unwrap();
        assert_eq!(adapter.supported_entity_types().len(), 2);
    }
}
