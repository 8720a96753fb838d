//! Wire events carried on the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::BusError;
use crate::entity::{EntityType, NormalizedRecord};
use crate::source::IntegrationType;

/// Schema version stamped into every wire event.
///
/// Consumers tolerate unknown additional fields; the version exists so a
/// future incompatible change can be detected instead of misparsed.
pub const EVENT_SCHEMA_VERSION: u8 = 1;

/// The batch of normalized entities produced by one fetch run.
///
/// Published on `<tenant>.<entity_type>.fetched`. One event per run;
/// runs with zero changed records publish nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedEvent {
    /// Unique event id, for consumer-side deduplication.
    pub event_id: Uuid,
    /// Wire schema version.
    #[serde(default = "default_schema_version")]
    pub schema_version: u8,
    /// Tenant the batch belongs to.
    pub tenant_id: Uuid,
    /// Data source the batch was fetched through.
    pub data_source_id: Uuid,
    /// Integration the data came from.
    pub integration: IntegrationType,
    /// Entity type of every record in the batch.
    pub entity_type: EntityType,
    /// The normalized records.
    pub entities: Vec<NormalizedRecord>,
    /// Publish timestamp.
    pub published_at: DateTime<Utc>,
}

fn default_schema_version() -> u8 {
    EVENT_SCHEMA_VERSION
}

impl FetchedEvent {
    /// Builds an event for a batch of records.
    pub fn new(
        tenant_id: Uuid,
        data_source_id: Uuid,
        integration: IntegrationType,
        entity_type: EntityType,
        entities: Vec<NormalizedRecord>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            schema_version: EVENT_SCHEMA_VERSION,
            tenant_id,
            data_source_id,
            integration,
            entity_type,
            entities,
            published_at: Utc::now(),
        }
    }

    /// Serializes the event for publishing.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BusError> {
        serde_json::to_vec(self).map_err(BusError::from)
    }

    /// Deserializes an event received from the bus.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BusError> {
        serde_json::from_slice(bytes).map_err(BusError::from)
    }

    /// Validates required fields before processing.
    ///
    /// Consumers reject (log, don't crash on) events that fail this.
    pub fn validate(&self) -> Result<(), BusError> {
        if self.tenant_id.is_nil() {
            return Err(BusError::serialization("fetched event with nil tenant id"));
        }
        for record in &self.entities {
            if record.external_id.is_empty() {
                return Err(BusError::serialization(
                    "fetched event contains a record with an empty external id",
                ));
            }
            if record.hash.is_empty() {
                return Err(BusError::serialization(
                    "fetched event contains a record with an empty hash",
                ));
            }
            if record.normalized.entity_type() != self.entity_type {
                return Err(BusError::serialization(format!(
                    "record entity type {} does not match batch entity type {}",
                    record.normalized.entity_type(),
                    self.entity_type
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityPayload, NormalizedEntity, Role};
    use serde_json::json;

    fn role_record(external_id: &str) -> NormalizedRecord {
        NormalizedEntity {
            external_id: external_id.to_string(),
            raw: json!({"id": external_id}),
            hash: "a".repeat(64),
            site_id: None,
            normalized: EntityPayload::Role(Role {
                name: "Helpdesk Administrator".to_string(),
                description: None,
                privileged: true,
                built_in: true,
                member_count: None,
            }),
        }
    }

    #[test]
    fn round_trips_through_bytes() {
        let event = FetchedEvent::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            IntegrationType::MicrosoftEntra,
            EntityType::Role,
            vec![role_record("r-1")],
        );
        let bytes = event.to_bytes().unwrap();
        let back = FetchedEvent::from_bytes(&bytes).unwrap();
        assert_eq!(back.event_id, event.event_id);
        assert_eq!(back.entities.len(), 1);
        back.validate().unwrap();
    }

    #[test]
    fn tolerates_unknown_fields() {
        let event = FetchedEvent::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            IntegrationType::MicrosoftEntra,
            EntityType::Role,
            vec![],
        );
        let mut value = serde_json::to_value(&event).unwrap();
        value["added_in_v2"] = json!("ignored");
        let back: FetchedEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back.event_id, event.event_id);
    }

    #[test]
    fn validate_rejects_mismatched_entity_type() {
        let mut event = FetchedEvent::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            IntegrationType::MicrosoftEntra,
            EntityType::Identity,
            vec![role_record("r-1")],
        );
        assert!(event.validate().is_err());

        event.entity_type = EntityType::Role;
        assert!(event.validate().is_ok());

        event.entities[0].external_id.clear();
        assert!(event.validate().is_err());
    }
}
