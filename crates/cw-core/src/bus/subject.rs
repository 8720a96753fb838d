//! Hierarchical subject names for the message bus.
//!
//! Subjects have the form `<tenant>.<entity_type>.<stage>`, e.g.
//! `0aa6…e1.endpoints.fetched`. Patterns may replace any segment with
//! `*`, so one analyzer deployment can serve every tenant for one entity
//! type with `*.endpoints.fetched`.

use crate::entity::EntityType;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::error::BusError;

/// Pipeline lifecycle stage a subject carries events for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Normalized entities leaving a fetch run.
    Fetched,
    /// Analyzer findings.
    Analysis,
}

impl Stage {
    /// Returns the subject-segment representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetched => "fetched",
            Stage::Analysis => "analysis",
        }
    }

    /// Parses a stage from its subject segment.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fetched" => Some(Stage::Fetched),
            "analysis" => Some(Stage::Analysis),
            _ => None,
        }
    }
}

/// A fully qualified subject: tenant, entity type, and stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subject {
    /// The tenant whose data flows on this subject.
    pub tenant_id: Uuid,
    /// The entity type carried.
    pub entity_type: EntityType,
    /// The lifecycle stage.
    pub stage: Stage,
}

impl Subject {
    /// Builds the `fetched` subject for a tenant and entity type.
    pub fn fetched(tenant_id: Uuid, entity_type: EntityType) -> Self {
        Self {
            tenant_id,
            entity_type,
            stage: Stage::Fetched,
        }
    }

    /// Builds the `analysis` subject for a tenant and entity type.
    pub fn analysis(tenant_id: Uuid, entity_type: EntityType) -> Self {
        Self {
            tenant_id,
            entity_type,
            stage: Stage::Analysis,
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.tenant_id,
            self.entity_type.as_subject_str(),
            self.stage.as_str()
        )
    }
}

impl FromStr for Subject {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '.');
        let (tenant, entity, stage) = match (parts.next(), parts.next(), parts.next()) {
            (Some(t), Some(e), Some(st)) => (t, e, st),
            _ => {
                return Err(BusError::invalid_subject(format!(
                    "expected <tenant>.<entity_type>.<stage>, got '{s}'"
                )))
            }
        };

        let tenant_id = Uuid::parse_str(tenant)
            .map_err(|_| BusError::invalid_subject(format!("bad tenant segment '{tenant}'")))?;
        let entity_type = EntityType::from_subject_str(entity)
            .ok_or_else(|| BusError::invalid_subject(format!("bad entity segment '{entity}'")))?;
        let stage = Stage::parse(stage)
            .ok_or_else(|| BusError::invalid_subject(format!("bad stage segment '{stage}'")))?;

        Ok(Subject {
            tenant_id,
            entity_type,
            stage,
        })
    }
}

impl Serialize for Subject {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Subject {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A subscription pattern over subjects.
///
/// Each segment is either a literal or the `*` wildcard (`None` here).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectPattern {
    /// Tenant to match; `None` matches every tenant.
    pub tenant_id: Option<Uuid>,
    /// Entity type to match; `None` matches every entity type.
    pub entity_type: Option<EntityType>,
    /// Stage to match; `None` matches every stage.
    pub stage: Option<Stage>,
}

impl SubjectPattern {
    /// Pattern matching exactly one subject.
    pub fn exact(subject: Subject) -> Self {
        Self {
            tenant_id: Some(subject.tenant_id),
            entity_type: Some(subject.entity_type),
            stage: Some(subject.stage),
        }
    }

    /// `*.<entity_type>.fetched` — every tenant's fetched events for one
    /// entity type.
    pub fn all_fetched(entity_type: EntityType) -> Self {
        Self {
            tenant_id: None,
            entity_type: Some(entity_type),
            stage: Some(Stage::Fetched),
        }
    }

    /// `*.*.analysis` — every analysis event across tenants and entity
    /// types.
    pub fn all_analysis() -> Self {
        Self {
            tenant_id: None,
            entity_type: None,
            stage: Some(Stage::Analysis),
        }
    }

    /// Parses a pattern string, allowing `*` in any segment.
    pub fn parse(s: &str) -> Result<Self, BusError> {
        let mut parts = s.splitn(3, '.');
        let (tenant, entity, stage) = match (parts.next(), parts.next(), parts.next()) {
            (Some(t), Some(e), Some(st)) => (t, e, st),
            _ => {
                return Err(BusError::invalid_subject(format!(
                    "expected three dot-separated segments, got '{s}'"
                )))
            }
        };

        let tenant_id = match tenant {
            "*" => None,
            t => Some(Uuid::parse_str(t).map_err(|_| {
                BusError::invalid_subject(format!("bad tenant segment '{t}'"))
            })?),
        };
        let entity_type = match entity {
            "*" => None,
            e => Some(EntityType::from_subject_str(e).ok_or_else(|| {
                BusError::invalid_subject(format!("bad entity segment '{e}'"))
            })?),
        };
        let stage = match stage {
            "*" => None,
            st => Some(Stage::parse(st).ok_or_else(|| {
                BusError::invalid_subject(format!("bad stage segment '{st}'"))
            })?),
        };

        Ok(Self {
            tenant_id,
            entity_type,
            stage,
        })
    }

    /// Returns whether the pattern matches a subject.
    pub fn matches(&self, subject: &Subject) -> bool {
        self.tenant_id.is_none_or(|t| t == subject.tenant_id)
            && self.entity_type.is_none_or(|e| e == subject.entity_type)
            && self.stage.is_none_or(|s| s == subject.stage)
    }
}

impl std::fmt::Display for SubjectPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.tenant_id {
            Some(t) => write!(f, "{t}")?,
            None => write!(f, "*")?,
        }
        match self.entity_type {
            Some(e) => write!(f, ".{}", e.as_subject_str())?,
            None => write!(f, ".*")?,
        }
        match self.stage {
            Some(s) => write!(f, ".{}", s.as_str()),
            None => write!(f, ".*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_round_trips_through_display() {
        let tenant = Uuid::new_v4();
        let subject = Subject::fetched(tenant, EntityType::Endpoint);
        let rendered = subject.to_string();
        assert!(rendered.ends_with(".endpoints.fetched"));

        let parsed: Subject = rendered.parse().unwrap();
        assert_eq!(parsed, subject);
    }

    #[test]
    fn subject_rejects_malformed_strings() {
        assert!("nonsense".parse::<Subject>().is_err());
        assert!("a.b".parse::<Subject>().is_err());
        let tenant = Uuid::new_v4();
        assert!(format!("{tenant}.widgets.fetched").parse::<Subject>().is_err());
        assert!(format!("{tenant}.endpoints.shipped").parse::<Subject>().is_err());
    }

    #[test]
    fn wildcard_pattern_matching() {
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();

        let pattern = SubjectPattern::all_fetched(EntityType::Endpoint);
        assert!(pattern.matches(&Subject::fetched(t1, EntityType::Endpoint)));
        assert!(pattern.matches(&Subject::fetched(t2, EntityType::Endpoint)));
        assert!(!pattern.matches(&Subject::fetched(t1, EntityType::Identity)));
        assert!(!pattern.matches(&Subject::analysis(t1, EntityType::Endpoint)));

        let analysis = SubjectPattern::all_analysis();
        assert!(analysis.matches(&Subject::analysis(t1, EntityType::License)));
        assert!(analysis.matches(&Subject::analysis(t2, EntityType::Identity)));
        assert!(!analysis.matches(&Subject::fetched(t1, EntityType::License)));
    }

    #[test]
    fn pattern_parse_round_trip() {
        let pattern = SubjectPattern::parse("*.endpoints.fetched").unwrap();
        assert_eq!(pattern, SubjectPattern::all_fetched(EntityType::Endpoint));
        assert_eq!(pattern.to_string(), "*.endpoints.fetched");

        let tenant = Uuid::new_v4();
        let exact = SubjectPattern::parse(&format!("{tenant}.roles.analysis")).unwrap();
        assert!(exact.matches(&Subject::analysis(tenant, EntityType::Role)));

        assert!(SubjectPattern::parse("*.widgets.*").is_err());
    }

    #[test]
    fn subject_serde_as_string() {
        let subject = Subject::analysis(Uuid::new_v4(), EntityType::License);
        let json = serde_json::to_string(&subject).unwrap();
        let back: Subject = serde_json::from_str(&json).unwrap();
        assert_eq!(back, subject);
    }
}
