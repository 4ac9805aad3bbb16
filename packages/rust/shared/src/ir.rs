//! The intermediate representation (IR) of an architecture model.
//!
//! One [`Ir`] value serves two roles: the partial fragment an extractor
//! emits, and the aggregated model every downstream stage consumes. The
//! serialized form (camelCase JSON) is the interchange contract between
//! extractors, generators, renderers, and doc writers.
//!
//! Fragments are allowed to be sparse and to repeat entities; the aggregate
//! crate merges duplicates. After aggregation, entity ids are unique per
//! collection and relationship endpoints are expected to resolve — enforced
//! by the validation stage, not here.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The unified architecture model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ir {
    /// System name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// System description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// When the model was produced (stamped by the pipeline per run).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// External/human participants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<Actor>,

    /// Deployable units.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<Container>,

    /// Logical units inside a container.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,

    /// Fine-grained code elements inside a component.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code: Vec<CodeItem>,

    /// Directed edges between any two entities above.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,

    /// Named environments with container placements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployments: Vec<Deployment>,
}

impl Ir {
    /// Total number of entities across the four entity collections.
    pub fn entity_count(&self) -> usize {
        self.actors.len() + self.containers.len() + self.components.len() + self.code.len()
    }

    /// Iterate over every declared entity id (empty ids are skipped —
    /// those entities are identified by name instead).
    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.actors
            .iter()
            .map(|a| a.id.as_str())
            .chain(self.containers.iter().map(|c| c.id.as_str()))
            .chain(self.components.iter().map(|c| c.id.as_str()))
            .chain(self.code.iter().map(|c| c.id.as_str()))
            .filter(|id| !id.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// The kind of an external participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActorKind {
    /// A human user.
    #[default]
    Person,
    /// An external software system.
    ExternalSystem,
}

/// An external or human participant in the architecture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// Globally unique id (post-aggregation). May be empty in fragments
    /// whose extractor could not derive a stable id.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: ActorKind,
    #[serde(default)]
    pub description: String,
}

/// A deployable unit (service, database, SPA, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Container type (e.g. "service", "database").
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub container_type: String,
    /// Architectural layer the container belongs to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub layer: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Primary implementation technology. First-writer-wins on merge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
}

/// A logical unit inside a container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Owning container.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

/// A fine-grained code element (function, class, method).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeItem {
    /// Usually path+symbol derived, e.g. `src/api/routes.py#handle_login`.
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Owning component.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub component_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Callable signature, when the extractor captured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Source position of a code element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

/// A directed edge between two entities.
///
/// Identity for deduplication is (source, destination, stereotype); two
/// relationships differing only in description or technology merge into one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub source_id: String,
    pub destination_id: String,
    /// Semantic kind tag, e.g. "uses", "imports".
    #[serde(default)]
    pub stereotype: String,
    #[serde(default)]
    pub description: String,
    /// Technologies carrying the edge (e.g. "http", "grpc"). Unioned on merge.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub technology: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Deployments
// ---------------------------------------------------------------------------

/// A named deployment environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<DeploymentInstance>,
}

/// Placement of a container in a deployment environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInstance {
    pub container_id: String,
    /// Deployment node the container runs on (host, cluster, region).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_deserializes_from_sparse_json() {
        let json = r#"{
            "components": [{"id": "c1", "name": "Api", "description": "REST layer"}],
            "relationships": [{"sourceId": "c1", "destinationId": "c2", "stereotype": "uses"}]
        }"#;
        let ir: Ir = serde_json::from_str(json).expect("parse fragment");
        assert_eq!(ir.components.len(), 1);
        assert_eq!(ir.components[0].container_id, "");
        assert_eq!(ir.relationships[0].source_id, "c1");
        assert!(ir.relationships[0].technology.is_empty());
        assert_eq!(ir.entity_count(), 1);
    }

    #[test]
    fn interchange_uses_camel_case_field_names() {
        let ir = Ir {
            relationships: vec![Relationship {
                source_id: "a".into(),
                destination_id: "b".into(),
                stereotype: "uses".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let json = serde_json::to_string(&ir).expect("serialize");
        assert!(json.contains("sourceId"));
        assert!(json.contains("destinationId"));
        assert!(!json.contains("source_id"));
    }

    #[test]
    fn actor_kind_tags() {
        let actor: Actor = serde_json::from_str(
            r#"{"id": "u1", "name": "Operator", "kind": "external-system"}"#,
        )
        .expect("parse actor");
        assert_eq!(actor.kind, ActorKind::ExternalSystem);
    }
}
